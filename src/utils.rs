use crate::selector::SelectionMode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
/// Every `Option` left as `None` is asked for interactively.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub db_path: PathBuf,
    pub output_path: PathBuf,
    pub attachments_dir: PathBuf,
    pub identifiers: Option<Vec<String>>,
    pub selection: Option<String>,
    pub selection_mode: SelectionMode,
    /// Ask for a year (and then a month) unless a window was given up front.
    pub prompt_window: bool,
    pub year: Option<i32>,
    pub month: Option<i64>,
    pub utc_offset: Option<i64>,
    pub my_name: Option<String>,
    /// Names bound before rendering starts, keyed by handle identifier.
    pub known_names: HashMap<String, String>,
    pub ask_names_upfront: bool,
    pub snapshot: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl ExportConfig {
    /// Defaults matching a plain interactive run in the current directory.
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            output_path: PathBuf::from("./output.html"),
            attachments_dir: PathBuf::from("./attachments"),
            identifiers: None,
            selection: None,
            selection_mode: SelectionMode::Single,
            prompt_window: true,
            year: None,
            month: None,
            utc_offset: None,
            my_name: None,
            known_names: HashMap::new(),
            ask_names_upfront: false,
            snapshot: true,
            verbose: false,
            quiet: false,
        }
    }
}

/// Escape text for use in HTML content and double- or single-quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Expand a leading `~` the way attachment paths in the database use it.
pub fn expand_home(raw: &str) -> PathBuf {
    expand_home_with(raw, dirs::home_dir().as_deref())
}

fn expand_home_with(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(raw),
    }
}
