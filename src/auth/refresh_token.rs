//! Persisting refresh tokens so they can be revoked.
//!
//! Only a SHA-256 hash of each token is stored, so a leaked database cannot be used to
//! mint access tokens.

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    timezone::{SQL_NOW, format_stored_timestamp},
};

/// Create the refresh token table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_refresh_token_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS refresh_token (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                expires_at TEXT NOT NULL,
                revoked_at TEXT,
                created_at TEXT NOT NULL DEFAULT ({SQL_NOW}),
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )"
        ),
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_refresh_token_user_id ON refresh_token(user_id)",
        (),
    )?;

    Ok(())
}

/// Hash a refresh token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Store a refresh token issued to `user_id`.
pub fn store_refresh_token(
    user_id: UserID,
    token: &str,
    expires_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO refresh_token (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
        (
            user_id.as_i64(),
            hash_token(token),
            format_stored_timestamp(expires_at),
        ),
    )?;

    Ok(())
}

/// Whether `token` has been stored, has not been revoked and has not expired.
pub fn is_refresh_token_active(token: &str, connection: &Connection) -> Result<bool, Error> {
    let count: i64 = connection.query_row(
        &format!(
            "SELECT COUNT(id) FROM refresh_token
             WHERE token_hash = ?1 AND revoked_at IS NULL AND expires_at > {SQL_NOW}"
        ),
        [hash_token(token)],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// Revoke `token` so it can no longer be exchanged.
///
/// Returns whether the token was active before this call. Revoking an unknown or
/// already revoked token is not an error.
pub fn revoke_refresh_token(token: &str, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        &format!(
            "UPDATE refresh_token SET revoked_at = {SQL_NOW}
             WHERE token_hash = ?1 AND revoked_at IS NULL"
        ),
        [hash_token(token)],
    )?;

    Ok(rows_affected > 0)
}
