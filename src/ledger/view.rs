//! Shared state and response types for the ledger endpoints.

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Database, Error, PaginationConfig,
    database_id::EntryId,
    ledger::LedgerEntry,
    timezone::format_api_timestamp,
};

/// The state needed by the ledger endpoints.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// The database that stores ledger entries.
    pub database: Database,
    /// The default and maximum page sizes for listing entries.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            database: state.database.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// A ledger entry as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    /// The ID of the entry.
    pub id: EntryId,
    /// The ID of the user who recorded the entry.
    pub user_id: i64,
    /// "donation" or "expense".
    pub entry_type: String,
    /// The amount with two decimal places.
    pub amount: String,
    /// RFC 3339 at UTC+8.
    pub occurred_at: String,
    /// The encoded type specific fields.
    pub description: String,
    /// The `YYYY-MM` month of the entry.
    pub month_key: String,
    /// RFC 3339 at UTC+8.
    pub created_at: String,
}

impl From<LedgerEntry> for EntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id.as_i64(),
            entry_type: entry.entry_type.to_string(),
            amount: entry.amount.to_string(),
            occurred_at: format_api_timestamp(entry.occurred_at),
            description: entry.description,
            month_key: entry.month_key,
            created_at: format_api_timestamp(entry.created_at),
        }
    }
}

/// Parse an entry ID taken from a URL path.
///
/// # Errors
/// Returns [Error::Validation] unless `raw` is a positive integer.
pub fn parse_entry_id(raw: &str) -> Result<EntryId, Error> {
    match raw.trim().parse::<EntryId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::Validation("invalid entry id".to_owned())),
    }
}
