//! Rescue Ledger is the accounting backend for a pet-rescue organization.
//!
//! It records donations and expenses as ledger entries and serves a JSON API
//! for creating, correcting, soft-deleting, listing and summarizing them.
//! Writes are guarded by caller-supplied idempotency keys so that a retried
//! request never records the same donation twice.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod amount;
mod app_state;
pub mod auth;
mod config;
mod database_id;
mod db;
mod endpoints;
pub mod ledger;
mod logging;
mod pagination;
mod routing;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use amount::Amount;
pub use app_state::AppState;
pub use config::{AdminInitConfig, Config, DatabaseConfig, TokenConfig};
pub use database_id::{DatabaseId, EntryId};
pub use db::{Database, initialize as initialize_db};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The client sent malformed or incomplete input, e.g. a missing donor or
    /// an amount with three decimal places.
    ///
    /// The message is shown to the client as-is.
    #[error("{0}")]
    Validation(String),

    /// A month filter was not of the form `YYYY-MM` with a month between 01 and 12.
    #[error("invalid month, expected YYYY-MM")]
    InvalidMonth,

    /// An entry type filter was neither "donation" nor "expense".
    #[error("invalid type, expected donation or expense")]
    InvalidEntryType,

    /// The requested page number was not a positive integer.
    #[error("page must be >= 1")]
    InvalidPage,

    /// The requested page size was not between one and the configured maximum.
    #[error("pageSize must be between 1 and {0}")]
    InvalidPageSize(u64),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The phone number or password used to log in was wrong.
    #[error("invalid phone or password")]
    InvalidCredentials,

    /// The request did not carry a valid token.
    ///
    /// The message describes which check failed, e.g. a missing bearer token
    /// or a refresh token used where an access token was expected.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The authenticated user does not have the role required by the route.
    #[error("forbidden")]
    Forbidden,

    /// The requested ledger entry was not found, or has been soft-deleted.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("entry not found")]
    NotFound,

    /// Tried to delete a ledger entry that has already been soft-deleted.
    #[error("entry already deleted")]
    AlreadyDeleted,

    /// An idempotency key was reused for a different operation or by a
    /// different user.
    ///
    /// This is not a retry: the client either has a bug or is reusing keys on
    /// purpose, and must pick a fresh key.
    #[error("idempotency key conflict")]
    IdempotencyConflict,

    /// An idempotency key has been reserved but the write it guards has not
    /// been finalized yet.
    ///
    /// The client should retry later rather than assume the write failed.
    #[error("request is in progress")]
    RequestInProgress,

    /// The phone number is already registered to another user.
    #[error("phone already registered")]
    DuplicatePhone,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A JSON web token could not be signed.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// A value read from the database could not be interpreted, e.g. an
    /// unknown entry type.
    #[error("invalid data in the database: {0}")]
    InvalidStoredData(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::InvalidMonth
            | Error::InvalidEntryType
            | Error::InvalidPage
            | Error::InvalidPageSize(_)
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::AlreadyDeleted
            | Error::IdempotencyConflict
            | Error::RequestInProgress
            | Error::DuplicatePhone => StatusCode::CONFLICT,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::InvalidStoredData(_)
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Unwrap a JSON request body, mapping any rejection to a 400 response.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!("rejected request body: {rejection}");
        Error::Validation("invalid request body".to_owned())
    })
}
