//! Helpers shared by the unit tests.

#![allow(missing_docs)]

use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;
use time::Duration;

use crate::{
    AppState, Database, PaginationConfig, build_router,
    auth::{
        PasswordHash, Role, TokenManager, TokenPair, User, UserID, ValidatedPassword, create_user,
        get_user_by_phone,
    },
    database_id::EntryId,
    db::initialize,
    endpoints,
};

/// A password strong enough to pass registration.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// The lowest bcrypt cost, so tests do not spend their time hashing.
pub(crate) const TEST_HASH_COST: u32 = 4;

pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();
    connection
}

/// Insert an admin that ledger entries can belong to.
pub(crate) fn insert_test_user(connection: &Connection) -> UserID {
    create_user(
        "0900000000",
        PasswordHash::new_unchecked("hunter2"),
        Role::Admin,
        connection,
    )
    .unwrap()
    .id
}

/// The full app served over a database file in a temporary directory.
pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("test.db")).unwrap();
        let token_manager = TokenManager::new(
            "a test secret that is long enough",
            Duration::minutes(15),
            Duration::hours(168),
        );
        let state = AppState::new(
            database,
            token_manager,
            PaginationConfig::default(),
            TEST_HASH_COST,
        );
        let server =
            TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

        Self {
            server,
            state,
            _dir: dir,
        }
    }

    /// Register a user with [TEST_PASSWORD] directly in the database.
    pub fn create_user(&self, phone: &str, role: Role) -> User {
        let connection = self.state.database.connect().unwrap();
        let password_hash = PasswordHash::new(
            ValidatedPassword::new_unchecked(TEST_PASSWORD),
            TEST_HASH_COST,
        )
        .unwrap();

        create_user(phone, password_hash, role, &connection).unwrap()
    }

    pub fn user_id(&self, phone: &str) -> UserID {
        let connection = self.state.database.connect().unwrap();
        get_user_by_phone(phone, &connection).unwrap().id
    }

    /// Log in through the API as a user made with [TestApp::create_user].
    pub async fn log_in(&self, phone: &str) -> TokenPair {
        let response = self
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "phone": phone, "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();

        response.json()
    }

    /// An access token for the user with `phone`, creating the user with `role` if needed.
    pub fn access_token_for(&self, phone: &str, role: Role) -> String {
        let connection = self.state.database.connect().unwrap();
        let user = match get_user_by_phone(phone, &connection) {
            Ok(user) => user,
            Err(_) => self.create_user(phone, role),
        };

        self.state
            .token_manager
            .issue(&user)
            .unwrap()
            .pair
            .access_token
    }

    /// Record a donation from Alice on 2024-01-15 and return its ID.
    pub async fn create_donation(&self, token: &str, request_id: &str, amount: &str) -> EntryId {
        let response = self
            .server
            .post(endpoints::DONATIONS)
            .authorization_bearer(token)
            .json(&json!({
                "donor": "Alice",
                "donatedAt": "2024-01-15",
                "amount": amount,
                "requestId": request_id,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        response.json::<serde_json::Value>()["entryId"]
            .as_i64()
            .unwrap()
    }

    /// Record an expense handled by Bob on 2024-01-20 and return its ID.
    pub async fn create_expense(&self, token: &str, request_id: &str, amount: &str) -> EntryId {
        let response = self
            .server
            .post(endpoints::EXPENSES)
            .authorization_bearer(token)
            .json(&json!({
                "purpose": "Cat food",
                "amount": amount,
                "handledBy": "Bob",
                "occurredAt": "2024-01-20",
                "requestId": request_id,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        response.json::<serde_json::Value>()["entryId"]
            .as_i64()
            .unwrap()
    }
}
