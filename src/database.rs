//! Read-only access to the Messages `chat.db` SQLite database.
//!
//! Only the tables below are read; their column names are those of the macOS
//! Messages schema.
//! ```sql
//! handle                  (ROWID INTEGER PRIMARY KEY, id TEXT)    -- phone number or email
//! chat_handle_join        (chat_id INTEGER, handle_id INTEGER)
//! message                 (ROWID INTEGER PRIMARY KEY, text TEXT,
//!                          date INTEGER,                         -- ns since 2001-01-01 UTC
//!                          is_from_me INTEGER, handle_id INTEGER) -- 0 is the local account
//! message_attachment_join (message_id INTEGER, attachment_id INTEGER)
//! attachment              (ROWID INTEGER PRIMARY KEY, filename TEXT) -- may start with "~"
//! chat_message_join       (chat_id INTEGER, message_id INTEGER)
//! ```
use crate::error::ExportError;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{Connection, OpenFlags, backup::Backup};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library/Messages/chat.db"))
}

/// An open, read-only view of the source database. When built from a snapshot
/// the temporary copy lives as long as this value.
pub struct SourceDb {
    conn: Connection,
    _snapshot: Option<NamedTempFile>,
}

impl SourceDb {
    /// Open `db_path` read-only, optionally via a private snapshot so that a
    /// running Messages app cannot change the data mid-export.
    pub fn open(db_path: &Path, snapshot: bool, quiet: bool) -> Result<Self, ExportError> {
        if !db_path.exists() {
            return Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database not found at {}", db_path.display()),
            )));
        }

        if !snapshot {
            return Ok(Self {
                conn: open_read_only(db_path)?,
                _snapshot: None,
            });
        }

        let tmp = backup_database(db_path, quiet)?;
        let conn = open_read_only(tmp.path())?;
        Ok(Self {
            conn,
            _snapshot: Some(tmp),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn open_read_only(path: &Path) -> Result<Connection, ExportError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.execute_batch("PRAGMA cache_size = -16384;")?;
    Ok(conn)
}

/// Copy the database to a temporary file with SQLite's online backup API.
fn backup_database(db_path: &Path, quiet: bool) -> Result<NamedTempFile, ExportError> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let s = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            let ticks = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            s.set_style(style.tick_strings(&ticks));
        }
        s.set_message("Snapshotting database...");
        s.enable_steady_tick(Duration::from_millis(80));
        s
    };

    let src = open_read_only(db_path)?;
    let tmp = NamedTempFile::new()?;
    let mut dst = Connection::open(tmp.path())?;

    {
        let backup = Backup::new(&src, &mut dst)?;
        backup.run_to_completion(1000, Duration::from_millis(5), None)?;
    }

    drop(dst);
    drop(src);
    spinner.finish_and_clear();
    Ok(tmp)
}

/// Builds `?,?,?` for an `IN (...)` clause with `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
