use crate::database::placeholders;
use crate::error::ExportError;
use rusqlite::{Connection, params_from_iter};

/// One row of the `handle` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub key: i64,
    pub identifier: String,
}

/// Split a comma-separated answer into identifiers. Surrounding whitespace
/// and empty entries are dropped; the identifiers themselves are untouched.
pub fn parse_identifiers(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Look up every handle whose identifier exactly matches one of `identifiers`.
/// Matching is case-sensitive and does no phone-number normalisation.
pub fn resolve_handles(
    conn: &Connection,
    identifiers: &[String],
) -> Result<Vec<Handle>, ExportError> {
    if identifiers.is_empty() {
        return Err(ExportError::NoMatchingUser(Vec::new()));
    }

    let sql = format!(
        "SELECT ROWID, id FROM handle WHERE id IN ({}) ORDER BY ROWID",
        placeholders(identifiers.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let handles = stmt
        .query_map(params_from_iter(identifiers.iter()), |row| {
            Ok(Handle {
                key: row.get(0)?,
                identifier: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if handles.is_empty() {
        return Err(ExportError::NoMatchingUser(identifiers.to_vec()));
    }
    Ok(handles)
}
