//! Timestamp parsing and formatting at the organization's fixed UTC+8 offset.

use time::{
    Date, OffsetDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::{format_description, offset},
};

use crate::Error;

/// The offset used to interpret bare dates and to bucket entries into months.
pub const LEDGER_OFFSET: UtcOffset = offset!(+8);

/// Format for timestamps written to the database, e.g. "2024-01-31T16:00:00.000Z".
///
/// Matches the format produced by SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` so
/// that application and storage assigned timestamps sort the same way as text.
const STORED_TIMESTAMP_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Format for bare calendar dates, e.g. "2024-01-31".
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// SQL expression for the current time in [STORED_TIMESTAMP_FORMAT].
pub const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Parse the time an entry occurred at from client input.
///
/// Accepts an RFC 3339 date-time with an offset, or a bare `YYYY-MM-DD` date which is
/// interpreted as midnight at [LEDGER_OFFSET]. `field` names the input in error messages.
///
/// The result is truncated to whole milliseconds, the precision timestamps are stored with.
///
/// # Errors
/// Returns [Error::Validation] if `raw` is blank or in neither format.
pub fn parse_occurred_at(raw: &str, field: &str) -> Result<OffsetDateTime, Error> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!(
            "invalid {field}: time value is required"
        )));
    }

    if let Ok(date_time) = OffsetDateTime::parse(value, &Rfc3339) {
        return date_time
            .replace_millisecond(date_time.millisecond())
            .map_err(|_| {
                Error::Validation(format!("invalid {field}: must be RFC3339 or YYYY-MM-DD"))
            });
    }

    if let Ok(date) = Date::parse(value, DATE_FORMAT) {
        return Ok(date.midnight().assume_offset(LEDGER_OFFSET));
    }

    Err(Error::Validation(format!(
        "invalid {field}: must be RFC3339 or YYYY-MM-DD"
    )))
}

/// Format a timestamp in UTC for storage.
pub fn format_stored_timestamp(date_time: OffsetDateTime) -> String {
    date_time
        .to_offset(UtcOffset::UTC)
        .format(STORED_TIMESTAMP_FORMAT)
        // The format only contains components every UTC date-time has.
        .unwrap_or_else(|_| date_time.unix_timestamp().to_string())
}

/// Parse a timestamp read from the database.
pub fn parse_stored_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339)
}

/// Format a timestamp for API responses as RFC 3339 at [LEDGER_OFFSET].
pub fn format_api_timestamp(date_time: OffsetDateTime) -> String {
    let local = date_time.to_offset(LEDGER_OFFSET);

    local
        .format(&Rfc3339)
        .unwrap_or_else(|_| format_stored_timestamp(date_time))
}
