//! The endpoint for logging out, which revokes a refresh token.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    Error,
    auth::{LoginState, RefreshTokenForm, revoke_refresh_token},
    json_body,
};

/// A route handler that revokes the refresh token in the request body.
///
/// Access tokens already issued stay valid until they expire.
pub async fn log_out(
    State(state): State<LoginState>,
    payload: Result<Json<RefreshTokenForm>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let form = json_body(payload)?;
    let refresh_token = form.token()?;

    state
        .token_manager
        .decode(refresh_token)
        .map_err(|_| Error::Unauthorized("invalid refresh token"))?;

    let connection = state.database.connect()?;
    if !revoke_refresh_token(refresh_token, &connection)? {
        tracing::debug!("logged out with a refresh token that was not active");
    }

    Ok(StatusCode::NO_CONTENT)
}
