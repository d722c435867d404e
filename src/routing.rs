//! Application router configuration with public, authenticated and admin route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::json;

use crate::{
    AppState,
    amount::validate_amount_endpoint,
    auth::{
        admin_guard, admin_ping, auth_guard, init_admin_endpoint, log_in, log_out,
        refresh_tokens, register_user,
    },
    endpoints,
    ledger::{
        create_donation_endpoint, create_expense_endpoint, delete_entry_endpoint,
        edit_entry_endpoint, get_summary_endpoint, list_entries_endpoint,
    },
    logging::logging_middleware,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(endpoints::ROOT, get(get_root))
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::REFRESH, post(refresh_tokens))
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::ADMIN_INIT, post(init_admin_endpoint))
        .route(endpoints::VALIDATE_AMOUNT, post(validate_amount_endpoint));

    let authenticated_routes = Router::new()
        .route(endpoints::LEDGER_ENTRIES, get(list_entries_endpoint))
        .route(endpoints::SUMMARY, get(get_summary_endpoint))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // The last layer added runs first, so `auth_guard` stores the user before
    // `admin_guard` checks its role.
    let admin_routes = Router::new()
        .route(endpoints::DONATIONS, post(create_donation_endpoint))
        .route(endpoints::EXPENSES, post(create_expense_endpoint))
        .route(
            endpoints::LEDGER_ENTRY,
            patch(edit_entry_endpoint).delete(delete_entry_endpoint),
        )
        .route(endpoints::ADMIN_PING, get(admin_ping))
        .route_layer(middleware::from_fn(admin_guard))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    public_routes
        .merge(authenticated_routes)
        .merge(admin_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// The root path '/' names the service.
async fn get_root() -> &'static str {
    "pet rescue accounting backend"
}

/// A liveness check that does not touch the database.
async fn get_health() -> Response {
    Json(json!({ "status": "ok", "service": "backend" })).into_response()
}

async fn get_404_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{endpoints, test_utils::TestApp};

    #[tokio::test]
    async fn root_names_service() {
        let app = TestApp::new();

        let response = app.server.get(endpoints::ROOT).await;

        response.assert_status_ok();
        response.assert_text("pet rescue accounting backend");
    }

    #[tokio::test]
    async fn health_check() {
        let app = TestApp::new();

        let response = app.server.get(endpoints::HEALTH).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok", "service": "backend" }));
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let app = TestApp::new();

        let response = app.server.get("/api/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "not found" }));
    }

    #[tokio::test]
    async fn validate_amount_is_public() {
        let app = TestApp::new();

        app.server
            .post(endpoints::VALIDATE_AMOUNT)
            .json(&json!({ "amount": "5" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
