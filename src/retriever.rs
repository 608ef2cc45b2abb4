use crate::database::placeholders;
use crate::error::ExportError;
use rusqlite::{Connection, Row, params_from_iter};

/// One (message, attachment) pairing as stored. A message with several
/// attachments yields one row per attachment, all sharing `message_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub message_key: i64,
    pub text: Option<String>,
    /// Nanoseconds since 2001-01-01T00:00:00Z.
    pub date_ns: i64,
    pub is_from_owner: bool,
    pub handle_key: i64,
    /// Identifier of the sending handle, absent for the local account.
    pub sender: Option<String>,
    pub attachment: Option<String>,
}

impl RawMessage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message_key: row.get(0)?,
            text: row.get(1)?,
            date_ns: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            is_from_owner: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
            handle_key: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            sender: row.get(5)?,
            attachment: row.get(6)?,
        })
    }
}

/// Every message of the given chats in timestamp order. Messages without an
/// attachment appear exactly once; a message shared by two selected chats is
/// still returned once.
pub fn retrieve_messages(conn: &Connection, chats: &[i64]) -> Result<Vec<RawMessage>, ExportError> {
    if chats.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT
            message.ROWID,
            message.text,
            message.date,
            message.is_from_me,
            message.handle_id,
            handle.id,
            attachment.filename
        FROM message
        LEFT JOIN handle
        ON handle.ROWID = message.handle_id
        LEFT JOIN message_attachment_join
        ON message.ROWID = message_attachment_join.message_id
        LEFT JOIN attachment
        ON attachment.ROWID = message_attachment_join.attachment_id
        WHERE message.ROWID IN (
            SELECT message_id FROM chat_message_join WHERE chat_id IN ({})
        )
        ORDER BY message.date, message.ROWID, attachment.ROWID",
        placeholders(chats.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(chats.iter()), RawMessage::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
