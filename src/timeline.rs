use crate::error::ExportError;
use crate::retriever::RawMessage;
use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Utc};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, where message
/// timestamps start counting.
pub const REFERENCE_EPOCH_UNIX: i64 = 978_307_200;

/// A message with its timestamp moved onto the caller's local clock.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMessage {
    pub message_key: i64,
    pub text: Option<String>,
    pub sent_at: DateTime<FixedOffset>,
    pub is_from_owner: bool,
    pub handle_key: i64,
    pub sender: Option<String>,
    pub attachment: Option<String>,
}

/// Optional calendar filter applied to local timestamps. The month is matched
/// on its own even when no year is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl TimeWindow {
    pub fn contains(&self, stamp: &DateTime<FixedOffset>) -> bool {
        self.year.is_none_or(|y| stamp.year() == y) && self.month.is_none_or(|m| stamp.month() == m)
    }
}

pub fn reference_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(REFERENCE_EPOCH_UNIX, 0).unwrap_or_default()
}

pub fn utc_offset(hours: i32) -> Result<FixedOffset, ExportError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or(ExportError::InvalidUtcOffset(hours as i64))
}

/// Convert a raw `message.date` value into a local timestamp.
pub fn to_local(date_ns: i64, offset: FixedOffset) -> DateTime<FixedOffset> {
    (reference_epoch() + TimeDelta::nanoseconds(date_ns)).with_timezone(&offset)
}

/// Shift every row onto the local clock and drop those outside `window`.
/// Row order is kept as retrieved.
pub fn normalize(
    rows: Vec<RawMessage>,
    window: TimeWindow,
    offset: FixedOffset,
) -> Vec<LocalMessage> {
    rows.into_iter()
        .filter_map(|row| {
            let sent_at = to_local(row.date_ns, offset);
            window.contains(&sent_at).then(|| LocalMessage {
                message_key: row.message_key,
                text: row.text,
                sent_at,
                is_from_owner: row.is_from_owner,
                handle_key: row.handle_key,
                sender: row.sender,
                attachment: row.attachment,
            })
        })
        .collect()
}
