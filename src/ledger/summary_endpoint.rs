//! Defines the endpoint for the monthly donation and expense totals.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    Error,
    ledger::{LedgerState, MonthKey, MonthlySummary, monthly_summary},
};

/// The query string for the monthly summary.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// The `YYYY-MM` month to summarize.
    #[serde(default)]
    pub month: String,
}

/// A route handler for the totals of one month.
///
/// Responds with 400 if `month` is missing or not of the form `YYYY-MM`.
pub async fn get_summary_endpoint(
    State(state): State<LedgerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<MonthlySummary>, Error> {
    let month: MonthKey = query.month.parse()?;

    let connection = state.database.connect()?;
    let summary = monthly_summary(&month, &connection)?;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::Role,
        endpoints::{self, format_endpoint},
        test_utils::TestApp,
    };

    #[tokio::test]
    async fn summarizes_live_entries_of_month() {
        let app = TestApp::new();
        let admin = app.access_token_for("0900000001", Role::Admin);
        let member = app.access_token_for("0900000002", Role::Member);
        app.create_donation(&admin, "r1", "100.00").await;
        let deleted = app.create_donation(&admin, "r2", "40.00").await;
        app.create_expense(&admin, "e1", "150.25").await;
        app.server
            .delete(&format_endpoint(endpoints::LEDGER_ENTRY, deleted))
            .authorization_bearer(&admin)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = app
            .server
            .get(endpoints::SUMMARY)
            .authorization_bearer(&member)
            .add_query_param("month", "2024-01")
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({
            "donation_total": "100.00",
            "expense_total": "150.25",
            "balance": "-50.25",
        }));
    }

    #[tokio::test]
    async fn rejects_missing_or_invalid_month() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Member);

        for month in ["2024-13", "2024-00", "24-01", ""] {
            let response = app
                .server
                .get(endpoints::SUMMARY)
                .authorization_bearer(&token)
                .add_query_param("month", month)
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({ "error": "invalid month, expected YYYY-MM" }));
        }

        app.server
            .get(endpoints::SUMMARY)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
