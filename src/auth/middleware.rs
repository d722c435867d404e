//! Authentication middleware that validates bearer tokens and checks roles.

use axum::{
    RequestPartsExt,
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState, Error,
    auth::{AuthUser, Role, TokenManager},
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Verifies the access tokens sent with requests.
    pub token_manager: TokenManager,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_manager: state.token_manager.clone(),
        }
    }
}

/// Middleware function that checks for a valid access token in the `Authorization` header.
///
/// The authenticated user is placed into the request and the request executed normally if
/// the token is valid, otherwise a 401 Unauthorized response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user): Extension<AuthUser>`
/// to receive the user.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
        Ok(TypedHeader(Authorization(bearer))) => bearer,
        Err(_) => return Error::Unauthorized("missing bearer token").into_response(),
    };

    let user = match state.token_manager.verify_access_token(token.token().trim()) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

/// Middleware function that only lets admins through.
///
/// Must be layered inside [auth_guard] so that the authenticated user is available.
pub async fn admin_guard(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.role == Role::Admin => next.run(request).await,
        Some(user) => {
            tracing::warn!("user {} tried to access an admin route", user.id);
            Error::Forbidden.into_response()
        }
        None => Error::Unauthorized("missing bearer token").into_response(),
    }
}
