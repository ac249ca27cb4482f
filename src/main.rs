pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use proctor::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    events::HostEvents,
    history::{AttemptHistory, AttemptRecord},
    logging,
    quiz::Quiz,
    runtime::{CrosstermEventSource, FixedTicker, QuizEvent, Runner},
    session::{QuizSession, SessionSettings},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 20;

/// terminal quiz runner that notices when you leave the window
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Take multiple-choice quizzes in the terminal. Leaving the terminal window while a quiz is running is counted and recorded with the attempt."
)]
pub struct Cli {
    /// quiz file (JSON) to take
    quiz: Option<PathBuf>,

    /// take one of the built-in quizzes instead of a file
    #[clap(short = 'b', long, conflicts_with = "quiz")]
    builtin: Option<String>,

    /// list built-in quizzes and exit
    #[clap(long)]
    list: bool,

    /// show recent attempts and exit
    #[clap(long)]
    history: bool,

    /// do not watch for focus loss
    #[clap(long)]
    no_focus_detection: bool,

    /// submit automatically after this many focus losses
    #[clap(short = 'm', long)]
    max_focus_losses: Option<u32>,

    /// time limit in seconds (overrides the quiz's own limit)
    #[clap(short = 't', long)]
    time: Option<u64>,

    /// shuffle questions and choices
    #[clap(short = 's', long)]
    shuffle: bool,
}

impl Cli {
    /// Merge CLI flags over the stored config
    fn settings(&self, cfg: &Config, quiz: &Quiz) -> SessionSettings {
        SessionSettings {
            focus_detection: cfg.focus_detection && !self.no_focus_detection,
            max_focus_losses: self.max_focus_losses.or(cfg.max_focus_losses),
            time_limit_secs: self
                .time
                .or(cfg.time_limit_secs)
                .or(quiz.time_limit_secs)
                .map(|s| s as f64),
        }
    }

    fn load_quiz(&self) -> proctor::Result<Quiz> {
        match (&self.quiz, &self.builtin) {
            (Some(path), _) => Quiz::load(path),
            (None, Some(name)) => Quiz::builtin(name),
            (None, None) => {
                let name = Quiz::builtin_names().into_iter().next().unwrap_or_default();
                Quiz::builtin(&name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Quiz,
    Results,
}

#[derive(Debug)]
pub struct App {
    pub host: HostEvents,
    pub session: QuizSession<HostEvents>,
    pub state: AppState,
    quiz: Quiz,
    shuffle: bool,
    history: Option<AttemptHistory>,
}

impl App {
    pub fn new(quiz: Quiz, settings: SessionSettings, shuffle: bool) -> Self {
        let host = HostEvents::new();
        let attempt = if shuffle {
            quiz.shuffled(&mut rand::thread_rng())
        } else {
            quiz.clone()
        };
        let session = QuizSession::new(attempt, host.clone(), settings);

        Self {
            host,
            session,
            state: AppState::Quiz,
            quiz,
            shuffle,
            history: None,
        }
    }

    pub fn with_history(mut self, history: AttemptHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Retry with the same question order, or a freshly shuffled one
    pub fn reset(&mut self, reshuffle: bool) {
        let quiz = (reshuffle && self.shuffle).then(|| self.quiz.shuffled(&mut rand::thread_rng()));
        self.session.restart(quiz);
        self.state = AppState::Quiz;
    }

    /// Move to results once the session has finished, recording the attempt
    fn sync_state(&mut self) {
        if self.state == AppState::Quiz && self.session.is_finished() {
            if let (Some(history), Some(result)) = (&self.history, self.session.result()) {
                if let Err(e) = history.record(&AttemptRecord::from(result)) {
                    warn!(error = %e, "failed to record attempt");
                }
            }
            self.state = AppState::Results;
        }
    }

    pub fn on_event(&mut self, event: QuizEvent, tick_secs: f64) -> bool {
        match event {
            QuizEvent::Tick => self.session.on_tick(tick_secs),
            QuizEvent::Resize => {}
            QuizEvent::FocusLost | QuizEvent::FocusGained => {
                if let Some(host_event) = event.as_host_event() {
                    self.host.dispatch(host_event);
                }
                self.session.enforce_focus_limit();
            }
            QuizEvent::Key(key) => {
                if !self.on_key(key.code) {
                    return false;
                }
            }
        }
        self.sync_state();
        true
    }

    /// Returns false when the app should quit
    fn on_key(&mut self, code: KeyCode) -> bool {
        match self.state {
            AppState::Quiz if self.session.detector().is_warning_open() => {
                if matches!(code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                    self.session.detector().close_warning();
                }
            }
            AppState::Quiz => match code {
                KeyCode::Esc => return false,
                KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                    let choice = c.to_digit(10).unwrap_or(1) as usize - 1;
                    self.session.select(choice);
                }
                KeyCode::Right | KeyCode::Char('l') => self.session.next(),
                KeyCode::Left | KeyCode::Char('h') => self.session.previous(),
                KeyCode::Enter => {
                    if self.session.current_index() + 1 == self.session.quiz().len() {
                        self.session.submit();
                    } else {
                        self.session.next();
                    }
                }
                _ => {}
            },
            AppState::Results => match code {
                KeyCode::Esc | KeyCode::Char('q') => return false,
                KeyCode::Char('r') => self.reset(false),
                KeyCode::Char('n') => self.reset(true),
                _ => {}
            },
        }
        true
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(&log_path);
    }

    if cli.list {
        for name in Quiz::builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    if cli.history {
        let history = AttemptHistory::open_default()?;
        for a in history.recent(HISTORY_LIMIT)? {
            println!(
                "{}  {:<24} {:>3}/{:<3} focus lost {}",
                a.completed_at.format("%Y-%m-%d %H:%M"),
                a.title,
                a.correct,
                a.total,
                a.focus_loss_count
            );
        }
        return Ok(());
    }

    let quiz = match cli.load_quiz() {
        Ok(quiz) => quiz,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e.to_string()).exit(),
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let cfg = FileConfigStore::new().load();
    let settings = cli.settings(&cfg, &quiz);
    info!(title = %quiz.title, ?settings, "starting quiz");

    let mut app = App::new(quiz, settings, cli.shuffle || cfg.shuffle_questions);
    match AttemptHistory::open_default() {
        Ok(history) => app = app.with_history(history),
        Err(e) => warn!(error = %e, "attempt history unavailable"),
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui(app, f))?;

        let event = runner.step();
        if !app.on_event(event, runner.tick_secs()) {
            break;
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use proctor::events::{HostEvent, Visibility};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> QuizEvent {
        QuizEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app(settings: SessionSettings) -> App {
        App::new(Quiz::builtin("geography").unwrap(), settings, false)
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["proctor"]);
        assert!(cli.quiz.is_none());
        assert!(!cli.no_focus_detection);
        assert!(!cli.shuffle);
        assert_eq!(cli.max_focus_losses, None);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::parse_from([
            "proctor",
            "--no-focus-detection",
            "--max-focus-losses",
            "2",
            "-t",
            "30",
        ]);
        let quiz = Quiz::builtin("geography").unwrap();
        let cfg = Config {
            max_focus_losses: Some(5),
            time_limit_secs: Some(99),
            ..Config::default()
        };
        let settings = cli.settings(&cfg, &quiz);
        assert!(!settings.focus_detection);
        assert_eq!(settings.max_focus_losses, Some(2));
        assert_eq!(settings.time_limit_secs, Some(30.0));
    }

    #[test]
    fn test_quiz_time_limit_used_as_fallback() {
        let cli = Cli::parse_from(["proctor"]);
        let quiz = Quiz::builtin("geography").unwrap();
        let settings = cli.settings(&Config::default(), &quiz);
        assert_eq!(settings.time_limit_secs, Some(120.0));
    }

    #[test]
    fn test_cli_builtin_conflicts_with_path() {
        let res = Cli::try_parse_from(["proctor", "quiz.json", "--builtin", "geography"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_load_default_builtin() {
        let cli = Cli::parse_from(["proctor"]);
        assert!(cli.load_quiz().is_ok());
    }

    #[test]
    fn test_focus_lost_opens_warning_and_enter_closes_it() {
        let mut app = app(SessionSettings::default());
        assert!(app.on_event(QuizEvent::FocusLost, 0.1));
        assert!(app.session.detector().is_warning_open());

        // keys other than dismissal are swallowed while the warning is up
        app.on_event(key(KeyCode::Char('1')), 0.1);
        assert_eq!(app.session.selected(), None);
        assert!(app.on_event(key(KeyCode::Esc), 0.1));

        assert!(!app.session.detector().is_warning_open());
        assert_eq!(app.session.store().focus_loss_count(), 1);
    }

    #[test]
    fn test_focus_gained_is_not_counted() {
        let mut app = app(SessionSettings::default());
        app.on_event(QuizEvent::FocusGained, 0.1);
        assert_eq!(app.session.store().focus_loss_count(), 0);
    }

    #[test]
    fn test_hidden_document_counts_through_host() {
        let app = app(SessionSettings::default());
        app.host
            .dispatch(HostEvent::VisibilityChange(Visibility::Hidden));
        assert_eq!(app.session.store().focus_loss_count(), 1);
    }

    #[test]
    fn test_answer_and_submit_flow() {
        let mut app = app(SessionSettings::default());
        app.on_event(key(KeyCode::Char('3')), 0.1);
        for _ in 0..app.session.quiz().len() {
            app.on_event(key(KeyCode::Enter), 0.1);
        }
        assert_eq!(app.state, AppState::Results);
        assert_eq!(app.session.result().map(|r| r.correct), Some(1));
    }

    #[test]
    fn test_focus_limit_ends_quiz() {
        let mut app = app(SessionSettings {
            max_focus_losses: Some(1),
            ..SessionSettings::default()
        });
        app.on_event(QuizEvent::FocusLost, 0.1);
        assert_eq!(app.state, AppState::Results);
    }

    #[test]
    fn test_timeout_ends_quiz() {
        let mut app = app(SessionSettings {
            time_limit_secs: Some(0.2),
            ..SessionSettings::default()
        });
        app.on_event(QuizEvent::Tick, 0.1);
        assert_eq!(app.state, AppState::Quiz);
        app.on_event(QuizEvent::Tick, 0.1);
        assert_eq!(app.state, AppState::Results);
    }

    #[test]
    fn test_results_keys() {
        let mut app = app(SessionSettings::default());
        app.session.submit();
        app.on_event(QuizEvent::Tick, 0.1);
        assert_eq!(app.state, AppState::Results);

        assert!(app.on_event(key(KeyCode::Char('r')), 0.1));
        assert_eq!(app.state, AppState::Quiz);
        assert!(!app.session.is_finished());

        app.session.submit();
        app.on_event(QuizEvent::Tick, 0.1);
        assert!(!app.on_event(key(KeyCode::Char('q')), 0.1));
    }

    #[test]
    fn test_attempt_recorded_in_history() {
        let mut app = app(SessionSettings::default())
            .with_history(AttemptHistory::in_memory().unwrap());
        app.on_event(QuizEvent::FocusLost, 0.1);
        app.session.submit();
        app.on_event(QuizEvent::Tick, 0.1);

        let recent = app.history.as_ref().unwrap().recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].focus_loss_count, 1);
    }

    #[test]
    fn test_ui_renders_warning_dialog() {
        let mut app = app(SessionSettings::default());
        app.on_event(QuizEvent::FocusLost, 0.1);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(&app, f)).unwrap();
        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Focus lost"));
    }

    #[test]
    fn test_ui_renders_results() {
        let mut app = app(SessionSettings::default());
        app.session.submit();
        app.on_event(QuizEvent::Tick, 0.1);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(&app, f)).unwrap();
        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("correct"));
    }
}
