use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ProctorError, Result};

static BUILTIN_DIR: Dir = include_dir!("src/quizzes");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub choices: Vec<String>,
    /// index into `choices`
    pub answer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let quiz: Quiz = serde_json::from_str(json).map_err(|source| ProctorError::QuizParse {
            name: name.to_string(),
            source,
        })?;
        quiz.validate()?;
        Ok(quiz)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ProctorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&path.display().to_string(), &json)
    }

    pub fn builtin(name: &str) -> Result<Self> {
        let file = BUILTIN_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| ProctorError::UnknownBuiltin(name.to_string()))?;
        let json = file
            .contents_utf8()
            .ok_or_else(|| ProctorError::InvalidQuiz(format!("{name} is not UTF-8")))?;
        Self::from_json(name, json)
    }

    /// Names accepted by [`Quiz::builtin`], sorted
    pub fn builtin_names() -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(ProctorError::InvalidQuiz(format!(
                "'{}' has no questions",
                self.title
            )));
        }
        for (idx, q) in self.questions.iter().enumerate() {
            if q.choices.len() < 2 {
                return Err(ProctorError::InvalidQuiz(format!(
                    "question {} needs at least two choices",
                    idx + 1
                )));
            }
            if q.answer >= q.choices.len() {
                return Err(ProctorError::InvalidQuiz(format!(
                    "question {} answer {} is out of range",
                    idx + 1,
                    q.answer
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Copy with question order and each question's choices shuffled
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .map(|q| {
                let mut order: Vec<usize> = (0..q.choices.len()).collect();
                order.shuffle(rng);
                Question {
                    prompt: q.prompt.clone(),
                    choices: order.iter().map(|&i| q.choices[i].clone()).collect(),
                    answer: order.iter().position(|&i| i == q.answer).unwrap_or(0),
                }
            })
            .collect();
        questions.shuffle(rng);

        Self {
            title: self.title.clone(),
            time_limit_secs: self.time_limit_secs,
            questions,
        }
    }

    pub fn score(&self, answers: &BTreeMap<usize, usize>, focus_loss_count: u32) -> QuizResult {
        let correct = self
            .questions
            .iter()
            .enumerate()
            .filter(|(idx, q)| answers.get(idx) == Some(&q.answer))
            .count();
        let answered = (0..self.questions.len())
            .filter(|idx| answers.contains_key(idx))
            .count();

        QuizResult {
            title: self.title.clone(),
            correct,
            total: self.questions.len(),
            unanswered: self.questions.len() - answered,
            focus_loss_count,
            completed_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub title: String,
    pub correct: usize,
    pub total: usize,
    pub unanswered: usize,
    pub focus_loss_count: u32,
    pub completed_at: DateTime<Local>,
}

impl QuizResult {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 * 100.0 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_questions() -> Quiz {
        Quiz::from_json(
            "test",
            r#"{
                "title": "t",
                "questions": [
                    { "prompt": "a?", "choices": ["x", "y"], "answer": 1 },
                    { "prompt": "b?", "choices": ["p", "q", "r"], "answer": 0 }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_without_time_limit() {
        let quiz = two_questions();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz.time_limit_secs, None);
    }

    #[test]
    fn rejects_malformed_json() {
        assert_matches!(
            Quiz::from_json("bad", "{"),
            Err(ProctorError::QuizParse { .. })
        );
    }

    #[test]
    fn rejects_empty_quiz() {
        let res = Quiz::from_json("empty", r#"{ "title": "e", "questions": [] }"#);
        assert_matches!(res, Err(ProctorError::InvalidQuiz(_)));
    }

    #[test]
    fn rejects_out_of_range_answer() {
        let res = Quiz::from_json(
            "oob",
            r#"{ "title": "o", "questions": [ { "prompt": "?", "choices": ["a", "b"], "answer": 2 } ] }"#,
        );
        assert_matches!(res, Err(ProctorError::InvalidQuiz(_)));
    }

    #[test]
    fn rejects_single_choice() {
        let res = Quiz::from_json(
            "one",
            r#"{ "title": "o", "questions": [ { "prompt": "?", "choices": ["a"], "answer": 0 } ] }"#,
        );
        assert_matches!(res, Err(ProctorError::InvalidQuiz(_)));
    }

    #[test]
    fn builtins_load_and_validate() {
        let names = Quiz::builtin_names();
        assert!(names.contains(&"rust-basics".to_string()));
        for name in names {
            let quiz = Quiz::builtin(&name).unwrap();
            assert!(!quiz.is_empty());
        }
    }

    #[test]
    fn unknown_builtin_errors() {
        assert_matches!(
            Quiz::builtin("nope"),
            Err(ProctorError::UnknownBuiltin(name)) if name == "nope"
        );
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            Quiz::load(dir.path().join("missing.json")),
            Err(ProctorError::Read { .. })
        );
    }

    #[test]
    fn score_counts_correct_and_unanswered() {
        let quiz = two_questions();
        let mut answers = BTreeMap::new();
        answers.insert(0, 1);

        let result = quiz.score(&answers, 2);
        assert_eq!(result.correct, 1);
        assert_eq!(result.unanswered, 1);
        assert_eq!(result.focus_loss_count, 2);
        assert_eq!(result.percentage(), 50.0);
    }

    #[test]
    fn shuffle_keeps_answers_pointing_at_same_text() {
        let quiz = Quiz::builtin("rust-basics").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = quiz.shuffled(&mut rng);

        assert_eq!(shuffled.len(), quiz.len());
        for q in &shuffled.questions {
            let original = quiz
                .questions
                .iter()
                .find(|o| o.prompt == q.prompt)
                .unwrap();
            assert_eq!(q.choices[q.answer], original.choices[original.answer]);
        }
    }
}
