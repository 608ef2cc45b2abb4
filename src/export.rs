use crate::database::SourceDb;
use crate::error::ExportError;
use crate::prompt::{
    self, Prompter, parse_int, parse_optional_int, validate_month, validate_utc_offset,
};
use crate::renderer::{AttachmentSink, NameBook, RenderContext, render_transcript};
use crate::resolver::{parse_identifiers, resolve_handles};
use crate::retriever::retrieve_messages;
use crate::selector::{chat_members, select_chats};
use crate::timeline::{TimeWindow, normalize, utc_offset};
use crate::utils::ExportConfig;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

const IDENTIFIER_PROMPT: &str = "Enter one or more user IDs to search for, separated by commas. \
In general, a user ID is the phone number with country code and no spaces \
(e.g., \"+15554443333\") or an email address.\nUser ID(s): ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub chats: usize,
    pub messages: usize,
    pub attachments_copied: usize,
    pub attachments_missing: usize,
    pub attachments_skipped: usize,
}

/// The main entry point for the export.
/// Refuses to run over previous output, then reads, filters and renders.
pub fn execute(
    config: &ExportConfig,
    prompter: &mut dyn Prompter,
) -> Result<ExportSummary, ExportError> {
    ensure_fresh_outputs(config)?;
    let source = SourceDb::open(&config.db_path, config.snapshot, config.quiet)?;
    let summary = run_internal(source.conn(), config, prompter)?;

    if !config.quiet {
        let mut line = format!(
            "Done. {} message(s) from {} chat(s), {} attachment(s) copied.",
            summary.messages, summary.chats, summary.attachments_copied
        );
        if summary.attachments_missing > 0 {
            line.push_str(&format!(
                " {} attachment(s) not found.",
                summary.attachments_missing
            ));
        }
        eprintln!("{}", line);
    }
    Ok(summary)
}

/// Neither the transcript nor the attachment folder may exist before a run.
pub fn ensure_fresh_outputs(config: &ExportConfig) -> Result<(), ExportError> {
    if config.output_path.exists() {
        return Err(ExportError::OutputExists(config.output_path.clone()));
    }
    if config.attachments_dir.exists() {
        return Err(ExportError::AttachmentsDirExists(
            config.attachments_dir.clone(),
        ));
    }
    Ok(())
}

fn run_internal(
    conn: &Connection,
    config: &ExportConfig,
    prompter: &mut dyn Prompter,
) -> Result<ExportSummary, ExportError> {
    let identifiers = match &config.identifiers {
        Some(ids) => ids.clone(),
        None => parse_identifiers(&prompt::ask(prompter, IDENTIFIER_PROMPT)?),
    };
    let handles = resolve_handles(conn, &identifiers)?;
    let chats = select_chats(
        conn,
        &handles,
        config.selection_mode,
        config.selection.as_deref(),
        prompter,
    )?;
    let rows = retrieve_messages(conn, &chats)?;

    let window = resolve_window(config, prompter)?;
    let offset_hours = match config.utc_offset {
        Some(hours) => hours,
        None => parse_int(&prompt::ask(prompter, "Enter a UTC offset in hours: ")?)?,
    };
    let offset = utc_offset(validate_utc_offset(offset_hours)?)?;
    let my_name = match &config.my_name {
        Some(name) => name.clone(),
        None => prompt::ask(prompter, "Enter your name: ")?,
    };

    let mut names = NameBook::with_names(config.known_names.clone());
    if config.ask_names_upfront {
        for chat in &chats {
            names.bind_all(chat_members(conn, *chat)?, prompter)?;
        }
    }

    let messages = normalize(rows, window, offset);
    let blocks = messages
        .chunk_by(|a, b| a.message_key == b.message_key)
        .count() as u64;

    // Links in the transcript are relative to the folder it is written to.
    let output_dir = config
        .output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(output_dir)?;
    let mut attachments = AttachmentSink::create(&config.attachments_dir, output_dir)?;
    let file = File::create_new(&config.output_path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => ExportError::OutputExists(config.output_path.clone()),
        _ => ExportError::Io(e),
    })?;
    let mut writer = BufWriter::new(file);

    let progress = make_bar(blocks, config.quiet);
    let rendered = {
        let mut ctx = RenderContext {
            owner_name: &my_name,
            names: &mut names,
            attachments: &mut attachments,
            prompter: &mut *prompter,
            progress: &progress,
            verbose: config.verbose,
        };
        render_transcript(&mut writer, &messages, &mut ctx)?
    };
    writer.flush()?;
    progress.finish_and_clear();

    Ok(ExportSummary {
        chats: chats.len(),
        messages: rendered.messages,
        attachments_copied: rendered.attachments_copied,
        attachments_missing: rendered.attachments_missing,
        attachments_skipped: rendered.attachments_skipped,
    })
}

/// Year and month filter, either as configured or asked for. A month is only
/// asked for once a year has been given.
fn resolve_window(
    config: &ExportConfig,
    prompter: &mut dyn Prompter,
) -> Result<TimeWindow, ExportError> {
    if !config.prompt_window {
        return Ok(TimeWindow {
            year: config.year,
            month: config.month.map(validate_month).transpose()?,
        });
    }

    let answer = prompt::ask(prompter, "Enter a year (or press enter for all years): ")?;
    let year = match parse_optional_int(&answer)? {
        Some(y) => Some(i32::try_from(y).map_err(|_| ExportError::NotAnInteger(answer))?),
        None => None,
    };
    let month = match year {
        Some(_) => parse_optional_int(&prompt::ask(
            prompter,
            "Enter a month as an integer (or press enter for all months): ",
        )?)?
        .map(validate_month)
        .transpose()?,
        None => None,
    };
    Ok(TimeWindow { year, month })
}

fn make_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)";
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.println(format!("Rendering {} message(s)...", total));
    bar
}
