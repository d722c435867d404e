//! The endpoint for registering a new member.

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Database, Error,
    auth::{PasswordHash, Role, UserID, ValidatedPassword, create_user},
    json_body,
};

/// The state needed for registering a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database to add users to.
    pub database: Database,
    /// The bcrypt cost used when hashing passwords.
    pub password_hash_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            database: state.database.clone(),
            password_hash_cost: state.password_hash_cost,
        }
    }
}

/// The phone number and password a user registers or logs in with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsForm {
    /// The phone number that identifies the user.
    #[serde(default)]
    pub phone: String,
    /// The user's password in plain text.
    #[serde(default)]
    pub password: String,
}

impl CredentialsForm {
    /// Trim both fields and check that neither is blank.
    ///
    /// # Errors
    /// Returns [Error::Validation] if either field is blank.
    pub fn normalized(self) -> Result<(String, String), Error> {
        let phone = self.phone.trim();
        let password = self.password.trim();

        if phone.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "phone and password are required".to_owned(),
            ));
        }

        Ok((phone.to_owned(), password.to_owned()))
    }
}

/// The registered user as returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RegisteredUser {
    /// The ID of the new user.
    pub id: UserID,
    /// The phone number the user registered with.
    pub phone: String,
    /// The role given to the user, always "member".
    pub role: Role,
}

/// A route handler for registering a new member.
///
/// Responds with 201 Created and the new user, 400 if the phone or password is missing
/// or the password is too weak, or 409 if the phone is already registered.
pub async fn register_user(
    State(state): State<RegistrationState>,
    payload: Result<Json<CredentialsForm>, JsonRejection>,
) -> Result<Response, Error> {
    let (phone, password) = json_body(payload)?.normalized()?;

    let password = ValidatedPassword::new(&password, &[&phone])?;
    let password_hash = PasswordHash::new(password, state.password_hash_cost)?;

    let connection = state.database.connect()?;
    let user = create_user(&phone, password_hash, Role::Member, &connection)?;

    tracing::info!("registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            phone: user.phone,
            role: user.role,
        }),
    )
        .into_response())
}

#[cfg(test)]
mod register_user_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::{Role, register_user::RegisteredUser},
        endpoints,
        test_utils::TestApp,
    };

    #[tokio::test]
    async fn register_user_succeeds() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::REGISTER)
            .json(&json!({ "phone": " 0912345678 ", "password": "averysafeandsecurepassword" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let user: RegisteredUser = response.json();
        assert_eq!(user.phone, "0912345678");
        assert_eq!(user.role, Role::Member);
    }

    #[tokio::test]
    async fn register_user_fails_with_duplicate_phone() {
        let app = TestApp::new();
        let body = json!({ "phone": "0912345678", "password": "averysafeandsecurepassword" });
        app.server
            .post(endpoints::REGISTER)
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        let response = app.server.post(endpoints::REGISTER).json(&body).await;

        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({ "error": "phone already registered" }));
    }

    #[tokio::test]
    async fn register_user_fails_with_blank_fields() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::REGISTER)
            .json(&json!({ "phone": "  ", "password": "averysafeandsecurepassword" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "phone and password are required" }));
    }

    #[tokio::test]
    async fn register_user_fails_with_weak_password() {
        let app = TestApp::new();

        app.server
            .post(endpoints::REGISTER)
            .json(&json!({ "phone": "0912345678", "password": "password" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_user_fails_with_malformed_body() {
        let app = TestApp::new();

        let response = app
            .server
            .post(endpoints::REGISTER)
            .text("phone=0912345678")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "invalid request body" }));
    }
}
