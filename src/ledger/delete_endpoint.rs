//! Defines the endpoint for soft-deleting a ledger entry.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Error,
    auth::AuthUser,
    ledger::{LedgerState, parse_entry_id, soft_delete_entry},
};

/// A route handler for soft-deleting an entry, responds with 204 No Content.
///
/// Responds with 404 if the entry does not exist and 409 if it was already deleted.
pub async fn delete_entry_endpoint(
    State(state): State<LedgerState>,
    Extension(user): Extension<AuthUser>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, Error> {
    let entry_id = parse_entry_id(&entry_id)?;

    let connection = state.database.connect()?;
    soft_delete_entry(entry_id, user.id, &connection)?;

    tracing::info!("user {} deleted entry {entry_id}", user.id);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::Role,
        endpoints::{self, format_endpoint},
        ledger::get_entry,
        test_utils::TestApp,
    };

    #[tokio::test]
    async fn deletes_entry_once() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);
        let entry_id = app.create_donation(&token, "r1", "100.00").await;
        let path = format_endpoint(endpoints::LEDGER_ENTRY, entry_id);

        app.server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let connection = app.state.database.connect().unwrap();
        let entry = get_entry(entry_id, &connection).unwrap();
        assert!(entry.deleted_at.is_some());
        assert_eq!(entry.deleted_by, Some(app.user_id("0900000001")));

        let response = app.server.delete(&path).authorization_bearer(&token).await;
        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({ "error": "entry already deleted" }));
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);

        let response = app
            .server
            .delete(&format_endpoint(endpoints::LEDGER_ENTRY, 42))
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "entry not found" }));
    }

    #[tokio::test]
    async fn rejects_zero_entry_id() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);

        app.server
            .delete(&format_endpoint(endpoints::LEDGER_ENTRY, 0))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn members_cannot_delete() {
        let app = TestApp::new();
        let admin = app.access_token_for("0900000001", Role::Admin);
        let member = app.access_token_for("0900000002", Role::Member);
        let entry_id = app.create_donation(&admin, "r1", "100.00").await;

        app.server
            .delete(&format_endpoint(endpoints::LEDGER_ENTRY, entry_id))
            .authorization_bearer(&member)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
