//! Opening connections to, and creating the tables of, the application database.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    auth::{create_refresh_token_table, create_user_table},
    ledger::{create_idempotency_key_table, create_ledger_entry_table},
};

/// How long a connection waits for another writer to finish before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle to the SQLite database file.
///
/// Each request opens its own connection with [Database::connect], so concurrent
/// requests are coordinated by SQLite's locking rather than by a lock in this process.
#[derive(Debug, Clone)]
pub struct Database {
    path: Arc<PathBuf>,
    busy_timeout: Duration,
}

impl Database {
    /// Open the database at `path`, creating the file and tables if needed.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let database = Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };

        let connection = database.connect()?;
        initialize(&connection)?;

        Ok(database)
    }

    /// The path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new connection to the database.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the file cannot be opened or configured.
    pub fn connect(&self) -> Result<Connection, Error> {
        let connection = Connection::open(self.path.as_ref())?;
        configure_connection(&connection, self.busy_timeout)?;

        Ok(connection)
    }
}

/// Apply the per-connection settings every connection needs.
pub fn configure_connection(
    connection: &Connection,
    busy_timeout: Duration,
) -> Result<(), rusqlite::Error> {
    connection.busy_timeout(busy_timeout)?;
    connection.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}

/// Create the tables for the application's models if they do not already exist.
///
/// # Errors
/// Returns an error if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Must be set outside of a transaction to take effect.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_refresh_token_table(&transaction)?;
    create_ledger_entry_table(&transaction)?;
    create_idempotency_key_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::db::{Database, initialize};

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();
        initialize(&connection).unwrap();

        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('user', 'refresh_token', 'ledger_entry', 'ledger_idempotency_key')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 4);
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("test.db")).unwrap();

        let connection = database.connect().unwrap();
        let enabled: i64 = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(enabled, 1);
        assert_eq!(database.path(), dir.path().join("test.db"));
    }
}
