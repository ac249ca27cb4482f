use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::quiz::QuizResult;

/// A finished attempt as stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub title: String,
    pub correct: usize,
    pub total: usize,
    pub focus_loss_count: u32,
    pub completed_at: DateTime<Local>,
}

impl From<&QuizResult> for AttemptRecord {
    fn from(r: &QuizResult) -> Self {
        Self {
            title: r.title.clone(),
            correct: r.correct,
            total: r.total,
            focus_loss_count: r.focus_loss_count,
            completed_at: r.completed_at,
        }
    }
}

/// Completed attempts, one row each
#[derive(Debug)]
pub struct AttemptHistory {
    conn: Connection,
}

impl AttemptHistory {
    /// Open the default database under the state directory
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::history_path().unwrap_or_else(|| PathBuf::from("proctor_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                correct INTEGER NOT NULL,
                total INTEGER NOT NULL,
                focus_loss_count INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attempts_completed_at ON attempts(completed_at)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attempts (title, correct, total, focus_loss_count, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                attempt.title,
                attempt.correct as i64,
                attempt.total as i64,
                attempt.focus_loss_count,
                attempt.completed_at.with_timezone(&Utc).to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent attempts first
    pub fn recent(&self, limit: usize) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT title, correct, total, focus_loss_count, completed_at
            FROM attempts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let ts: String = row.get(4)?;
            let completed_at = DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Local);

            Ok(AttemptRecord {
                title: row.get(0)?,
                correct: row.get::<_, i64>(1)? as usize,
                total: row.get::<_, i64>(2)? as usize,
                focus_loss_count: row.get(3)?,
                completed_at,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}
