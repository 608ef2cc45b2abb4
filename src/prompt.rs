use crate::error::ExportError;
use dialoguer::Input;
use dialoguer::console::Term;
use std::io;

/// Interactive input. The pipeline only ever asks for a single line and shows
/// informational lines; how those reach the person is up to the implementor.
pub trait Prompter {
    /// Show `question` and return the answer without its line terminator.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Show a line that needs no answer.
    fn say(&mut self, line: &str) -> io::Result<()>;
}

/// Asks on the terminal through `dialoguer`. Blank answers are accepted so
/// optional values can be skipped with enter.
pub struct TerminalPrompter {
    term: Term,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt_label(question))
            .allow_empty(true)
            .interact_text_on(&self.term)
            .map_err(io::Error::other)
    }

    fn say(&mut self, line: &str) -> io::Result<()> {
        self.term.write_line(line)
    }
}

/// `dialoguer` adds its own `": "` after the prompt.
fn prompt_label(question: &str) -> &str {
    let trimmed = question.trim_end();
    trimmed.strip_suffix(':').unwrap_or(trimmed)
}

pub fn parse_int(input: &str) -> Result<i64, ExportError> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| ExportError::NotAnInteger(input.to_string()))
}

/// Like [`parse_int`], but a blank answer means "no value".
pub fn parse_optional_int(input: &str) -> Result<Option<i64>, ExportError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_int(input).map(Some)
}

pub fn validate_month(month: i64) -> Result<u32, ExportError> {
    match month {
        1..=12 => Ok(month as u32),
        _ => Err(ExportError::InvalidMonth(month)),
    }
}

pub fn validate_utc_offset(hours: i64) -> Result<i32, ExportError> {
    match hours {
        -23..=23 => Ok(hours as i32),
        _ => Err(ExportError::InvalidUtcOffset(hours)),
    }
}

pub(crate) fn ask(prompter: &mut dyn Prompter, question: &str) -> Result<String, ExportError> {
    prompter.ask(question).map_err(ExportError::Prompt)
}

pub(crate) fn say(prompter: &mut dyn Prompter, line: &str) -> Result<(), ExportError> {
    prompter.say(line).map_err(ExportError::Prompt)
}
