//! Recording ledger entries exactly once per client-supplied request ID.
//!
//! A request ID is reserved in the `ledger_idempotency_key` table in the same transaction
//! that inserts the entry it guards, so a retried or concurrent request either sees the
//! finished write and replays its result, or never sees the key at all.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use crate::{
    Error,
    auth::UserID,
    database_id::EntryId,
    ledger::{NewEntry, Operation, get_entry, insert_entry},
    timezone::SQL_NOW,
};

/// The longest request ID a client may send.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;

/// A client-supplied key that identifies one logical write across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Trim and check a request ID.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `raw` is blank or longer than [MAX_REQUEST_ID_LENGTH].
    pub fn new(raw: &str) -> Result<Self, Error> {
        let request_id = raw.trim();

        if request_id.is_empty() {
            return Err(Error::Validation("request id is required".to_owned()));
        }

        if request_id.chars().count() > MAX_REQUEST_ID_LENGTH {
            return Err(Error::Validation(format!(
                "request id must be at most {MAX_REQUEST_ID_LENGTH} characters"
            )));
        }

        Ok(Self(request_id.to_owned()))
    }

    /// Pick the request ID from the `Idempotency-Key` header, falling back to the
    /// `requestId` body field when the header is missing or blank.
    pub fn from_header_or_body(header: Option<&str>, body: Option<&str>) -> Result<Self, Error> {
        match header.map(str::trim).filter(|value| !value.is_empty()) {
            Some(header) => Self::new(header),
            None => Self::new(body.unwrap_or_default()),
        }
    }

    /// The request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The result of [create_entry_once].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The entry that belongs to the request ID.
    pub entry_id: EntryId,
    /// Whether an earlier request already created the entry.
    pub replayed: bool,
}

/// Create the table of reserved request IDs.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_idempotency_key_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS ledger_idempotency_key (
                request_id TEXT PRIMARY KEY,
                operation TEXT NOT NULL CHECK (operation IN ('donation', 'expense', 'reversal')),
                created_by INTEGER NOT NULL,
                entry_id INTEGER,
                created_at TEXT NOT NULL DEFAULT ({SQL_NOW}),
                FOREIGN KEY(created_by) REFERENCES user(id) ON UPDATE CASCADE,
                FOREIGN KEY(entry_id) REFERENCES ledger_entry(id) ON UPDATE CASCADE
                )"
        ),
        (),
    )?;

    Ok(())
}

fn is_duplicate_key(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            },
            _
        )
    )
}

/// Record `new_entry` for `created_by` unless `request_id` has been used before.
///
/// The first call with a request ID inserts the entry and returns its ID with
/// `replayed == false`. Later calls with the same request ID, operation and user return the
/// same entry ID with `replayed == true` and write nothing, even if `new_entry` differs
/// from what was first submitted.
///
/// Everything happens in one immediate transaction, so concurrent calls with the same
/// request ID queue behind the first and then see its committed key. If anything fails
/// before the commit, neither the key nor the entry is kept.
///
/// # Errors
/// Returns:
/// - [Error::IdempotencyConflict] if the request ID was used for a different operation or
///   by a different user,
/// - [Error::RequestInProgress] if the request ID is reserved but has no entry yet,
/// - [Error::SqlError] if a query failed.
pub fn create_entry_once(
    connection: &mut Connection,
    request_id: &RequestId,
    operation: Operation,
    created_by: UserID,
    new_entry: &NewEntry,
) -> Result<WriteOutcome, Error> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let reserved = transaction.execute(
        "INSERT INTO ledger_idempotency_key (request_id, operation, created_by)
         VALUES (?1, ?2, ?3)",
        (request_id.as_str(), operation, created_by.as_i64()),
    );

    match reserved {
        Ok(_) => {}
        Err(error) if is_duplicate_key(&error) => {
            let (stored_operation, stored_created_by, entry_id): (Operation, i64, Option<EntryId>) =
                transaction.query_row(
                    "SELECT operation, created_by, entry_id FROM ledger_idempotency_key
                     WHERE request_id = ?1",
                    [request_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

            if stored_operation != operation || stored_created_by != created_by.as_i64() {
                tracing::warn!(
                    "request id {:?} was reused for {operation} by user {created_by}, \
                     it belongs to {stored_operation} by user {stored_created_by}",
                    request_id.as_str()
                );
                return Err(Error::IdempotencyConflict);
            }

            let Some(entry_id) = entry_id else {
                return Err(Error::RequestInProgress);
            };

            let original = get_entry(entry_id, &transaction)?;
            if !original.matches(new_entry) {
                tracing::warn!(
                    "request id {:?} was replayed with a different payload, \
                     returning the original entry {entry_id}",
                    request_id.as_str()
                );
            }

            return Ok(WriteOutcome {
                entry_id,
                replayed: true,
            });
        }
        Err(error) => return Err(error.into()),
    }

    let entry_id = insert_entry(created_by, new_entry, &transaction)?;

    transaction.execute(
        "UPDATE ledger_idempotency_key SET entry_id = ?1 WHERE request_id = ?2",
        (entry_id, request_id.as_str()),
    )?;

    transaction.commit()?;

    tracing::info!(
        "user {created_by} recorded {operation} entry {entry_id} for request id {:?}",
        request_id.as_str()
    );

    Ok(WriteOutcome {
        entry_id,
        replayed: false,
    })
}

/// Get the entry ID a request ID has been finalized with, if any.
pub fn get_reserved_entry(
    request_id: &RequestId,
    connection: &Connection,
) -> Result<Option<EntryId>, Error> {
    let entry_id: Option<Option<EntryId>> = connection
        .query_row(
            "SELECT entry_id FROM ledger_idempotency_key WHERE request_id = ?1",
            [request_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(entry_id.flatten())
}
