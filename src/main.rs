use clap::Parser;
use eyre::{Context, Result, eyre};
use imessage_transcript_export::database::default_db_path;
use imessage_transcript_export::export;
use imessage_transcript_export::prompt::TerminalPrompter;
use imessage_transcript_export::selector::SelectionMode;
use imessage_transcript_export::utils::ExportConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Export one Messages conversation to an HTML transcript.
/// Anything not given on the command line or in the config file is asked for.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the Messages SQLite DB (chat.db).
    /// Defaults to ~/Library/Messages/chat.db.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/imessage-transcript-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTML file to write. Must not exist yet.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Folder for copied attachments. Must not exist yet.
    #[arg(long, value_name = "PATH")]
    attachments_dir: Option<PathBuf>,

    /// Comma-separated phone numbers or emails, exactly as stored (e.g. "+15554443333").
    #[arg(long = "id", value_name = "IDS", value_delimiter = ',')]
    ids: Option<Vec<String>>,

    /// Chat number(s) to pick when several conversations match.
    #[arg(long, value_name = "N[,N...]")]
    chat: Option<String>,

    /// Allow exporting several matching conversations into one transcript.
    #[arg(long)]
    multi: bool,

    /// Only export messages from this (local) year.
    #[arg(long, conflicts_with = "all_time")]
    year: Option<i32>,

    /// Only export messages from this (local) month, 1-12.
    #[arg(long, conflicts_with = "all_time")]
    month: Option<i64>,

    /// Export every message without asking for a year or month.
    #[arg(long)]
    all_time: bool,

    /// UTC offset in whole hours used for dates and times (e.g. -5).
    #[arg(long, value_name = "HOURS", allow_hyphen_values = true)]
    utc_offset: Option<i64>,

    /// Your display name in the transcript.
    #[arg(long, value_name = "NAME")]
    my_name: Option<String>,

    /// Ask for every participant's name before rendering instead of on first message.
    #[arg(long)]
    ask_names_upfront: bool,

    /// Read chat.db directly instead of from a temporary snapshot.
    #[arg(long)]
    no_snapshot: bool,

    /// Print each attachment copied, skipped or missing.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress bars and the final summary.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    db_path: Option<PathBuf>,
    output: Option<PathBuf>,
    attachments_dir: Option<PathBuf>,
    my_name: Option<String>,
    utc_offset: Option<i64>,
    #[serde(default)]
    names: HashMap<String, String>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("imessage-transcript-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve db_path (CLI > Config > Default)
    let db_path = cli
        .db
        .or(file_cfg.db_path)
        .or_else(default_db_path)
        .ok_or_else(|| {
            eyre!(
                "Could not determine database path.\n\
                 Use --db to specify manually, or set db_path in config.toml."
            )
        })?;

    // 3. Build the Export Config
    let mut config = ExportConfig::new(db_path);
    if let Some(output) = cli.output.or(file_cfg.output) {
        config.output_path = output;
    }
    if let Some(dir) = cli.attachments_dir.or(file_cfg.attachments_dir) {
        config.attachments_dir = dir;
    }
    config.identifiers = cli.ids;
    config.selection = cli.chat;
    config.selection_mode = if cli.multi {
        SelectionMode::Multiple
    } else {
        SelectionMode::Single
    };
    config.prompt_window = !(cli.all_time || cli.year.is_some() || cli.month.is_some());
    config.year = cli.year;
    config.month = cli.month;
    config.utc_offset = cli.utc_offset.or(file_cfg.utc_offset);
    config.my_name = cli.my_name.or(file_cfg.my_name);
    config.known_names = file_cfg.names;
    config.ask_names_upfront = cli.ask_names_upfront;
    config.snapshot = !cli.no_snapshot;
    config.verbose = cli.verbose;
    config.quiet = cli.quiet;

    // 4. Run the Business Logic
    let mut prompter = TerminalPrompter::new();
    export::execute(&config, &mut prompter)
        .map(|_| ())
        .map_err(|e| eyre::Report::new(e).wrap_err("Export failed"))
}
