//! Implements a struct that holds the state of the REST server.

use crate::{Database, auth::TokenManager, pagination::PaginationConfig};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database that every request opens its own connection to.
    pub database: Database,

    /// Signs and verifies access and refresh tokens.
    pub token_manager: TokenManager,

    /// The config that controls how to page through ledger entries.
    pub pagination_config: PaginationConfig,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
}

impl AppState {
    /// Create a new [AppState] for an already initialized `database`.
    pub fn new(
        database: Database,
        token_manager: TokenManager,
        pagination_config: PaginationConfig,
        password_hash_cost: u32,
    ) -> Self {
        Self {
            database,
            token_manager,
            pagination_config,
            password_hash_cost,
        }
    }
}
