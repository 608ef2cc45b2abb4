use crate::database::placeholders;
use crate::error::ExportError;
use crate::prompt::{self, Prompter, parse_int};
use crate::resolver::Handle;
use rusqlite::{Connection, params_from_iter};

/// Whether the caller may pick more than one conversation when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

/// All distinct chats that include at least one of `handles`, ordered by key.
pub fn candidate_chats(conn: &Connection, handles: &[Handle]) -> Result<Vec<i64>, ExportError> {
    if handles.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT DISTINCT chat_id FROM chat_handle_join WHERE handle_id IN ({}) ORDER BY chat_id",
        placeholders(handles.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let chats = stmt
        .query_map(params_from_iter(handles.iter().map(|h| h.key)), |row| {
            row.get::<_, i64>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chats)
}

/// Identifiers of every member of `chat`.
pub fn chat_members(conn: &Connection, chat: i64) -> Result<Vec<String>, ExportError> {
    let mut stmt = conn.prepare(
        "SELECT handle.id
         FROM handle
         INNER JOIN chat_handle_join ON handle.ROWID = chat_handle_join.handle_id
         WHERE chat_handle_join.chat_id = ?1
         ORDER BY handle.ROWID",
    )?;
    let members = stmt
        .query_map([chat], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

/// Pick the conversation(s) to export.
///
/// A single candidate is returned without asking. With several, each one is
/// listed with its members and the caller chooses by 1-based number; in
/// [`SelectionMode::Multiple`] a comma-separated list is accepted. `preselected`
/// stands in for the typed answer when the choice was given up front.
pub fn select_chats(
    conn: &Connection,
    handles: &[Handle],
    mode: SelectionMode,
    preselected: Option<&str>,
    prompter: &mut dyn Prompter,
) -> Result<Vec<i64>, ExportError> {
    let candidates = candidate_chats(conn, handles)?;
    match candidates.len() {
        0 => return Err(ExportError::NoConversation),
        1 => return Ok(candidates),
        _ => {}
    }

    let answer = match preselected {
        Some(answer) => answer.to_string(),
        None => {
            prompt::say(
                prompter,
                "Multiple chats found containing the specified user ID:",
            )?;
            let width = candidates.len().to_string().len();
            for (i, chat) in candidates.iter().enumerate() {
                let members = chat_members(conn, *chat)?;
                prompt::say(
                    prompter,
                    &format!("    Option {:>width$}:  {}", i + 1, members.join(", ")),
                )?;
            }
            let question = match mode {
                SelectionMode::Single => "Select a chat by entering its number: ",
                SelectionMode::Multiple => {
                    "Select one or more chats by entering their numbers, separated by commas: "
                }
            };
            prompt::ask(prompter, question)?
        }
    };

    let picks = parse_selection(&answer, mode, candidates.len())?;
    Ok(picks.into_iter().map(|i| candidates[i - 1]).collect())
}

/// Turn an answer into 1-based option numbers, each within `1..=available`.
/// The first malformed or out-of-range token fails the whole answer.
pub fn parse_selection(
    answer: &str,
    mode: SelectionMode,
    available: usize,
) -> Result<Vec<usize>, ExportError> {
    let tokens: Vec<&str> = match mode {
        SelectionMode::Single => vec![answer],
        SelectionMode::Multiple => answer
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .collect(),
    };
    if tokens.is_empty() {
        return Err(ExportError::EmptySelection);
    }

    let mut picks: Vec<usize> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let selection = parse_int(token)?;
        if selection < 1 || selection as u64 > available as u64 {
            return Err(ExportError::SelectionOutOfRange {
                selection,
                available,
            });
        }
        let index = selection as usize;
        if !picks.contains(&index) {
            picks.push(index);
        }
    }
    Ok(picks)
}
