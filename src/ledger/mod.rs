//! The donation and expense ledger.
//!
//! This module contains everything related to ledger entries:
//! - The `LedgerEntry` model and the validated `NewEntry` used to write one
//! - The idempotent write path that records an entry once per request ID
//! - Database functions for updating, soft-deleting, listing and summarizing entries
//! - The route handlers for the ledger API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod entries_endpoint;
mod idempotency;
mod month;
mod summary_endpoint;
mod view;

pub use core::{
    EntryDetails, EntryFilter, EntryType, LedgerEntry, MonthlySummary, NewEntry, Operation,
    count_entries, create_ledger_entry_table, get_entry, insert_entry, list_entries,
    map_entry_row, monthly_summary, soft_delete_entry, update_entry,
};
pub use create_endpoint::{
    DonationForm, ExpenseForm, IDEMPOTENCY_KEY, IDEMPOTENCY_REPLAYED, create_donation_endpoint,
    create_expense_endpoint,
};
pub use delete_endpoint::delete_entry_endpoint;
pub use edit_endpoint::{EditEntryForm, edit_entry_endpoint};
pub use entries_endpoint::{EntryList, ListEntriesQuery, list_entries_endpoint};
pub use idempotency::{
    RequestId, WriteOutcome, create_entry_once, create_idempotency_key_table, get_reserved_entry,
};
pub use month::MonthKey;
pub use summary_endpoint::{SummaryQuery, get_summary_endpoint};
pub use view::{EntryView, LedgerState, parse_entry_id};
