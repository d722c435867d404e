//! The endpoints for logging in and exchanging refresh tokens.

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use rusqlite::TransactionBehavior;
use serde::Deserialize;

use crate::{
    AppState, Database, Error,
    auth::{
        CredentialsForm, TokenManager, TokenPair, get_user_by_id, get_user_by_phone,
        is_refresh_token_active, revoke_refresh_token, store_refresh_token,
    },
    json_body,
};

/// The state needed to log in or refresh tokens.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The database holding users and refresh tokens.
    pub database: Database,
    /// Signs the issued tokens.
    pub token_manager: TokenManager,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            database: state.database.clone(),
            token_manager: state.token_manager.clone(),
        }
    }
}

/// A request body carrying a refresh token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenForm {
    /// The refresh token issued at log-in or by the last refresh.
    #[serde(default)]
    pub refresh_token: String,
}

impl RefreshTokenForm {
    /// The trimmed token.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the token is blank.
    pub fn token(&self) -> Result<&str, Error> {
        let token = self.refresh_token.trim();

        if token.is_empty() {
            return Err(Error::Validation("refreshToken is required".to_owned()));
        }

        Ok(token)
    }
}

/// A route handler for logging in with a phone number and password.
///
/// Responds with a new access and refresh token, or 401 if the phone is not registered or
/// the password is wrong.
pub async fn log_in(
    State(state): State<LoginState>,
    payload: Result<Json<CredentialsForm>, JsonRejection>,
) -> Result<Json<TokenPair>, Error> {
    let (phone, password) = json_body(payload)?.normalized()?;
    let connection = state.database.connect()?;

    let user = match get_user_by_phone(&phone, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    let is_password_valid = user
        .password_hash
        .verify(&password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_valid {
        tracing::info!("failed log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let tokens = state.token_manager.issue(&user)?;
    store_refresh_token(
        user.id,
        &tokens.pair.refresh_token,
        tokens.refresh_expires_at,
        &connection,
    )?;

    Ok(Json(tokens.pair))
}

/// A route handler that exchanges a refresh token for a new token pair.
///
/// The old refresh token is revoked in the same transaction that stores the new one, so a
/// refresh token can be exchanged at most once.
pub async fn refresh_tokens(
    State(state): State<LoginState>,
    payload: Result<Json<RefreshTokenForm>, JsonRejection>,
) -> Result<Json<TokenPair>, Error> {
    let form = json_body(payload)?;
    let refresh_token = form.token()?;

    let user_id = state.token_manager.verify_refresh_token(refresh_token)?;

    let mut connection = state.database.connect()?;
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !is_refresh_token_active(refresh_token, &transaction)? {
        return Err(Error::Unauthorized("refresh token is revoked or expired"));
    }

    let user = match get_user_by_id(user_id, &transaction) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::Unauthorized("user not found")),
        Err(error) => return Err(error),
    };

    revoke_refresh_token(refresh_token, &transaction)?;
    let tokens = state.token_manager.issue(&user)?;
    store_refresh_token(
        user.id,
        &tokens.pair.refresh_token,
        tokens.refresh_expires_at,
        &transaction,
    )?;

    transaction.commit()?;

    Ok(Json(tokens.pair))
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::{Role, TokenPair},
        endpoints,
        test_utils::{TEST_PASSWORD, TestApp},
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let app = TestApp::new();
        app.create_user("0912345678", Role::Member);

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "phone": "0912345678", "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let tokens: TokenPair = response.json();
        let user = app
            .state
            .token_manager
            .verify_access_token(&tokens.access_token)
            .unwrap();
        assert_eq!(user.phone, "0912345678");
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let app = TestApp::new();
        app.create_user("0912345678", Role::Member);

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "phone": "0912345678", "password": "definitelynotthepassword" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "error": "invalid phone or password" }));
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_phone() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "phone": "0912345678", "password": TEST_PASSWORD }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "error": "invalid phone or password" }));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let app = TestApp::new();
        app.create_user("0912345678", Role::Member);
        let tokens = app.log_in("0912345678").await;

        let response = app
            .server
            .post(endpoints::REFRESH)
            .json(&json!({ "refreshToken": tokens.refresh_token }))
            .await;

        response.assert_status_ok();
        let new_tokens: TokenPair = response.json();
        assert_ne!(new_tokens.refresh_token, tokens.refresh_token);

        // The old refresh token can only be exchanged once.
        let response = app
            .server
            .post(endpoints::REFRESH)
            .json(&json!({ "refreshToken": tokens.refresh_token }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "error": "refresh token is revoked or expired" }));

        app.server
            .post(endpoints::REFRESH)
            .json(&json!({ "refreshToken": new_tokens.refresh_token }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let app = TestApp::new();
        app.create_user("0912345678", Role::Member);
        let tokens = app.log_in("0912345678").await;

        let response = app
            .server
            .post(endpoints::REFRESH)
            .json(&json!({ "refreshToken": tokens.access_token }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "error": "invalid refresh token type" }));
    }

    #[tokio::test]
    async fn refresh_requires_token() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::REFRESH)
            .json(&json!({ "refreshToken": " " }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "refreshToken is required" }));
    }
}
