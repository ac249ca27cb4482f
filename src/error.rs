use std::path::PathBuf;

use thiserror::Error;

/// Failures outside the focus-monitoring core: files, history, terminal
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed quiz {name}: {source}")]
    QuizParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("No built-in quiz named '{0}'")]
    UnknownBuiltin(String),

    #[error("History database error: {0}")]
    History(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProctorError>;
