use std::path::PathBuf;

/// Coarse class of a fatal condition. Every class terminates the run; the
/// distinction exists so callers can tell bad input from a missing record or
/// a broken environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    LookupMiss,
    OutputExists,
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("\"{0}\" is not a valid integer")]
    NotAnInteger(String),

    #[error("\"{selection}\" is not an available option (choose 1-{available})")]
    SelectionOutOfRange { selection: i64, available: usize },

    #[error("no chat was selected")]
    EmptySelection,

    #[error("\"{0}\" is not a valid month")]
    InvalidMonth(i64),

    #[error("\"{0}\" is not a valid UTC offset in hours (expected -23 to 23)")]
    InvalidUtcOffset(i64),

    #[error("unable to locate a user with ID {}", quote_all(.0))]
    NoMatchingUser(Vec<String>),

    #[error("no conversation found for the matching user(s)")]
    NoConversation,

    #[error("output file \"{}\" already exists; delete or move it to proceed", .0.display())]
    OutputExists(PathBuf),

    #[error("attachment folder \"{}\" already exists; delete or move it to proceed", .0.display())]
    AttachmentsDirExists(PathBuf),

    #[error("database query failed")]
    Database(#[from] rusqlite::Error),

    #[error("file system operation failed")]
    Io(#[from] std::io::Error),

    #[error("failed to read an answer from the terminal")]
    Prompt(#[source] std::io::Error),
}

impl ExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::NotAnInteger(_)
            | ExportError::SelectionOutOfRange { .. }
            | ExportError::EmptySelection
            | ExportError::InvalidMonth(_)
            | ExportError::InvalidUtcOffset(_) => ErrorCategory::Validation,
            ExportError::NoMatchingUser(_) | ExportError::NoConversation => {
                ErrorCategory::LookupMiss
            }
            ExportError::OutputExists(_) | ExportError::AttachmentsDirExists(_) => {
                ErrorCategory::OutputExists
            }
            ExportError::Database(_) | ExportError::Io(_) | ExportError::Prompt(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }
}

fn quote_all(ids: &[String]) -> String {
    if ids.is_empty() {
        return "\"\"".to_string();
    }
    ids.iter()
        .map(|id| format!("\"{}\"", id))
        .collect::<Vec<_>>()
        .join(", ")
}
