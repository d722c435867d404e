//! Defines the core data models and database queries for ledger entries.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql, named_params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Amount, Error,
    amount::format_cents,
    auth::UserID,
    database_id::EntryId,
    ledger::MonthKey,
    pagination::PageRequest,
    timezone::{SQL_NOW, format_stored_timestamp, parse_stored_timestamp},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money given to the rescue.
    Donation,
    /// Money the rescue spent.
    Expense,
}

impl EntryType {
    /// The entry type as stored in the database and shown to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Donation => "donation",
            EntryType::Expense => "expense",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    /// Parse a type filter, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "donation" => Ok(EntryType::Donation),
            "expense" => Ok(EntryType::Expense),
            _ => Err(Error::InvalidEntryType),
        }
    }
}

impl ToSql for EntryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EntryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "donation" => Ok(EntryType::Donation),
            "expense" => Ok(EntryType::Expense),
            other => Err(FromSqlError::Other(Box::new(Error::InvalidStoredData(
                format!("unknown entry type {other:?}"),
            )))),
        }
    }
}

/// The kind of write an idempotency key was reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Recording a donation.
    Donation,
    /// Recording an expense.
    Expense,
    /// Reversing an earlier entry. Reserved so that keys stay unambiguous once reversals
    /// are recorded, no endpoint issues it yet.
    Reversal,
}

impl Operation {
    /// The operation as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Donation => "donation",
            Operation::Expense => "expense",
            Operation::Reversal => "reversal",
        }
    }
}

impl From<EntryType> for Operation {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Donation => Operation::Donation,
            EntryType::Expense => Operation::Expense,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Operation {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Operation {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "donation" => Ok(Operation::Donation),
            "expense" => Ok(Operation::Expense),
            "reversal" => Ok(Operation::Reversal),
            other => Err(FromSqlError::Other(Box::new(Error::InvalidStoredData(
                format!("unknown operation {other:?}"),
            )))),
        }
    }
}

/// The fields that depend on the type of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDetails {
    /// Who gave the donation.
    Donation {
        /// The name of the donor.
        donor: String,
    },
    /// What the money was spent on and who spent it.
    Expense {
        /// What the money was spent on.
        purpose: String,
        /// The person who handled the payment.
        handled_by: String,
    },
}

impl EntryDetails {
    /// Trim and check the fields of a donation.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `donor` is blank.
    pub fn donation(donor: &str) -> Result<Self, Error> {
        let donor = donor.trim();

        if donor.is_empty() {
            return Err(Error::Validation("donor is required".to_owned()));
        }

        Ok(Self::Donation {
            donor: donor.to_owned(),
        })
    }

    /// Trim and check the fields of an expense.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `purpose` or `handled_by` is blank.
    pub fn expense(purpose: &str, handled_by: &str) -> Result<Self, Error> {
        let purpose = purpose.trim();
        let handled_by = handled_by.trim();

        if purpose.is_empty() {
            return Err(Error::Validation("purpose is required".to_owned()));
        }

        if handled_by.is_empty() {
            return Err(Error::Validation("handledBy is required".to_owned()));
        }

        Ok(Self::Expense {
            purpose: purpose.to_owned(),
            handled_by: handled_by.to_owned(),
        })
    }

    /// The type of entry these details belong to.
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryDetails::Donation { .. } => EntryType::Donation,
            EntryDetails::Expense { .. } => EntryType::Expense,
        }
    }

    /// The details encoded as the stored description text.
    pub fn description(&self) -> String {
        match self {
            EntryDetails::Donation { donor } => format!("donor={donor}"),
            EntryDetails::Expense {
                purpose,
                handled_by,
            } => format!("purpose={purpose};handled_by={handled_by}"),
        }
    }
}

/// A validated entry that has not been written yet, or the new values for an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// How much money.
    pub amount: Amount,
    /// When the money changed hands.
    pub occurred_at: OffsetDateTime,
    /// The type specific fields.
    pub details: EntryDetails,
}

impl NewEntry {
    /// The type of the entry.
    pub fn entry_type(&self) -> EntryType {
        self.details.entry_type()
    }

    /// The month the entry is bucketed into.
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date_time(self.occurred_at)
    }
}

/// A donation or expense recorded in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The ID of the entry.
    pub id: EntryId,
    /// The user who recorded the entry.
    pub user_id: UserID,
    /// Whether the entry is a donation or an expense.
    pub entry_type: EntryType,
    /// How much money.
    pub amount: Amount,
    /// When the money changed hands.
    pub occurred_at: OffsetDateTime,
    /// The type specific fields encoded as text, see [EntryDetails::description].
    pub description: String,
    /// The `YYYY-MM` month of `occurred_at` at UTC+8.
    pub month_key: String,
    /// When the entry was recorded.
    pub created_at: OffsetDateTime,
    /// When the entry was soft-deleted, if it has been.
    pub deleted_at: Option<OffsetDateTime>,
    /// Who soft-deleted the entry, if anyone has.
    pub deleted_by: Option<UserID>,
}

impl LedgerEntry {
    /// Whether the entry holds the same values as `new_entry`.
    pub fn matches(&self, new_entry: &NewEntry) -> bool {
        self.entry_type == new_entry.entry_type()
            && self.amount == new_entry.amount
            && self.occurred_at == new_entry.occurred_at
            && self.description == new_entry.details.description()
    }
}

/// Which entries to list or count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    /// Only include entries from this month.
    pub month: Option<MonthKey>,
    /// Only include entries of this type.
    pub entry_type: Option<EntryType>,
}

/// The totals for one month as two decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The sum of all donations.
    pub donation_total: String,
    /// The sum of all expenses.
    pub expense_total: String,
    /// Donations minus expenses, may be negative.
    pub balance: String,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const ENTRY_COLUMNS: &str = "id, user_id, entry_type, amount_cents, occurred_at, description, \
     month_key, created_at, deleted_at, deleted_by";

/// Create the ledger entry table and its indexes.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_ledger_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS ledger_entry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                entry_type TEXT NOT NULL CHECK (entry_type IN ('donation', 'expense')),
                amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
                occurred_at TEXT NOT NULL,
                description TEXT NOT NULL,
                month_key TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT ({SQL_NOW}),
                deleted_at TEXT,
                deleted_by INTEGER,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE,
                FOREIGN KEY(deleted_by) REFERENCES user(id) ON UPDATE CASCADE
                )"
        ),
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entry_month_type
         ON ledger_entry(month_key, entry_type, deleted_at)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entry_created_at
         ON ledger_entry(created_at DESC, id DESC)",
        (),
    )?;

    Ok(())
}

fn get_timestamp(row: &Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let raw: String = row.get(index)?;

    parse_stored_timestamp(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}

fn get_optional_timestamp(
    row: &Row,
    index: usize,
) -> Result<Option<OffsetDateTime>, rusqlite::Error> {
    let raw: Option<String> = row.get(index)?;

    raw.map(|raw| {
        parse_stored_timestamp(&raw).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
        })
    })
    .transpose()
}

/// Map a row selected with [ENTRY_COLUMNS] to a [LedgerEntry].
pub fn map_entry_row(row: &Row) -> Result<LedgerEntry, rusqlite::Error> {
    let deleted_by: Option<i64> = row.get(9)?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        entry_type: row.get(2)?,
        amount: Amount::from_cents(row.get(3)?),
        occurred_at: get_timestamp(row, 4)?,
        description: row.get(5)?,
        month_key: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
        deleted_at: get_optional_timestamp(row, 8)?,
        deleted_by: deleted_by.map(UserID::new),
    })
}

/// Insert a new entry recorded by `user_id` and return its ID.
///
/// This does not guard against duplicates, use
/// [create_entry_once](crate::ledger::create_entry_once) for client requests.
///
/// # Errors
/// Returns an [Error::SqlError] if the insert failed.
pub fn insert_entry(
    user_id: UserID,
    new_entry: &NewEntry,
    connection: &Connection,
) -> Result<EntryId, Error> {
    connection
        .prepare(
            "INSERT INTO ledger_entry
                (user_id, entry_type, amount_cents, occurred_at, description, month_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id",
        )?
        .query_row(
            (
                user_id.as_i64(),
                new_entry.entry_type(),
                new_entry.amount.cents(),
                format_stored_timestamp(new_entry.occurred_at),
                new_entry.details.description(),
                new_entry.month_key().as_str(),
            ),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get an entry by ID, including soft-deleted entries.
///
/// # Errors
/// Returns [Error::NotFound] if there is no entry with `id`.
pub fn get_entry(id: EntryId, connection: &Connection) -> Result<LedgerEntry, Error> {
    connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entry WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_entry_row)
        .map_err(|error| error.into())
}

/// Overwrite the amount, time and details of a live entry.
///
/// The type of an entry cannot change, so `new_entry` must have the same type as the
/// stored entry.
///
/// # Errors
/// Returns [Error::NotFound] if there is no live entry with `id` and the type of
/// `new_entry`.
pub fn update_entry(id: EntryId, new_entry: &NewEntry, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE ledger_entry
         SET amount_cents = ?1, occurred_at = ?2, month_key = ?3, description = ?4
         WHERE id = ?5 AND entry_type = ?6 AND deleted_at IS NULL",
        (
            new_entry.amount.cents(),
            format_stored_timestamp(new_entry.occurred_at),
            new_entry.month_key().as_str(),
            new_entry.details.description(),
            id,
            new_entry.entry_type(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Mark an entry as deleted by `deleted_by`.
///
/// An entry can only be deleted once, even when several requests try at the same time.
///
/// # Errors
/// Returns [Error::NotFound] if there is no entry with `id`, or [Error::AlreadyDeleted]
/// if it has already been deleted.
pub fn soft_delete_entry(
    id: EntryId,
    deleted_by: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let deleted_at: Option<String> = connection.query_row(
        "SELECT deleted_at FROM ledger_entry WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if deleted_at.is_some() {
        return Err(Error::AlreadyDeleted);
    }

    let rows_affected = connection.execute(
        &format!(
            "UPDATE ledger_entry SET deleted_at = {SQL_NOW}, deleted_by = ?1
             WHERE id = ?2 AND deleted_at IS NULL"
        ),
        (deleted_by.as_i64(), id),
    )?;

    // Another request deleted the entry between the check and the update.
    if rows_affected == 0 {
        return Err(Error::AlreadyDeleted);
    }

    Ok(())
}

const FILTER_CLAUSE: &str = "deleted_at IS NULL
    AND (:month IS NULL OR month_key = :month)
    AND (:entry_type IS NULL OR entry_type = :entry_type)";

/// Get a page of live entries, newest first.
pub fn list_entries(
    filter: &EntryFilter,
    page: PageRequest,
    connection: &Connection,
) -> Result<Vec<LedgerEntry>, Error> {
    let limit = i64::try_from(page.page_size).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entry
             WHERE {FILTER_CLAUSE}
             ORDER BY created_at DESC, id DESC
             LIMIT :limit OFFSET :offset"
        ))?
        .query_map(
            named_params! {
                ":month": filter.month.as_ref().map(MonthKey::as_str),
                ":entry_type": filter.entry_type,
                ":limit": limit,
                ":offset": offset,
            },
            map_entry_row,
        )?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Count the live entries that match `filter`.
pub fn count_entries(filter: &EntryFilter, connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row(
        &format!("SELECT COUNT(id) FROM ledger_entry WHERE {FILTER_CLAUSE}"),
        named_params! {
            ":month": filter.month.as_ref().map(MonthKey::as_str),
            ":entry_type": filter.entry_type,
        },
        |row| row.get(0),
    )?;

    u64::try_from(count).map_err(|_| Error::InvalidStoredData(format!("negative count {count}")))
}

/// Sum the live donations and expenses of `month`.
pub fn monthly_summary(month: &MonthKey, connection: &Connection) -> Result<MonthlySummary, Error> {
    let (donation_cents, expense_cents): (i64, i64) = connection.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN entry_type = 'donation' THEN amount_cents END), 0),
            COALESCE(SUM(CASE WHEN entry_type = 'expense' THEN amount_cents END), 0)
         FROM ledger_entry
         WHERE month_key = ?1 AND deleted_at IS NULL",
        [month.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let balance_cents = donation_cents.checked_sub(expense_cents).ok_or_else(|| {
        Error::InvalidStoredData(format!("balance of {month} does not fit in 64 bits"))
    })?;

    Ok(MonthlySummary {
        donation_total: format_cents(donation_cents),
        expense_total: format_cents(expense_cents),
        balance: format_cents(balance_cents),
    })
}
