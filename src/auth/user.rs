//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash, timezone::SQL_NOW};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May record, correct and delete ledger entries.
    Admin,
    /// May only read the ledger.
    Member,
}

impl Role {
    /// The role as stored in the database and in tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(Error::InvalidStoredData(format!("unknown role {other:?}"))),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The phone number the user logs in with.
    pub phone: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// What the user is allowed to do.
    pub role: Role,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                phone TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'member')),
                created_at TEXT NOT NULL DEFAULT ({SQL_NOW})
                )"
        ),
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        phone: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        role: row.get(3)?,
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicatePhone] if `phone` is already registered,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    phone: &str,
    password_hash: PasswordHash,
    role: Role,
    connection: &Connection,
) -> Result<User, Error> {
    let id = connection
        .query_row(
            "INSERT INTO user (phone, password, role) VALUES (?1, ?2, ?3) RETURNING id",
            (phone, password_hash.as_ref(), role),
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicatePhone,
            error => error.into(),
        })?;

    Ok(User {
        id: UserID::new(id),
        phone: phone.to_owned(),
        password_hash,
        role,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, phone, password, role FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `phone`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has registered `phone`.
pub fn get_user_by_phone(phone: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, phone, password, role FROM user WHERE phone = :phone")?
        .query_row(&[(":phone", &phone)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the number of admins in the database.
pub fn count_admins(connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM user WHERE role = ?1",
            [Role::Admin],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Change the role of the user `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn set_role(user_id: UserID, role: Role, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET role = ?1 WHERE id = ?2",
        (role, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
