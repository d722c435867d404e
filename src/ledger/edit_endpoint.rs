//! Defines the endpoint for correcting a ledger entry.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;

use crate::{
    Amount, Error, json_body,
    ledger::{
        EntryDetails, EntryType, EntryView, LedgerState, NewEntry, get_entry, parse_entry_id,
        update_entry,
    },
    timezone::parse_occurred_at,
};

/// The request body for correcting an entry.
///
/// Donations use `donor` and `donatedAt`, expenses use `purpose`, `handledBy` and
/// `occurredAt`. Fields for the other type are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditEntryForm {
    /// The corrected amount.
    pub amount: String,
    /// The corrected donor of a donation.
    pub donor: String,
    /// The corrected time of a donation.
    pub donated_at: String,
    /// The corrected purpose of an expense.
    pub purpose: String,
    /// The corrected payer of an expense.
    pub handled_by: String,
    /// The corrected time of an expense.
    pub occurred_at: String,
}

impl EditEntryForm {
    fn into_new_entry(self, amount: Amount, entry_type: EntryType) -> Result<NewEntry, Error> {
        let (details, occurred_at) = match entry_type {
            EntryType::Donation => {
                let details = EntryDetails::donation(&self.donor)?;
                (details, parse_occurred_at(&self.donated_at, "donatedAt")?)
            }
            EntryType::Expense => {
                let details = EntryDetails::expense(&self.purpose, &self.handled_by)?;
                (details, parse_occurred_at(&self.occurred_at, "occurredAt")?)
            }
        };

        Ok(NewEntry {
            amount,
            occurred_at,
            details,
        })
    }
}

/// A route handler for overwriting the amount, time and details of an entry.
///
/// The type of an entry cannot be changed. Responds with the updated entry, 404 if the
/// entry does not exist or was deleted, or 400 if the new values are invalid.
pub async fn edit_entry_endpoint(
    State(state): State<LedgerState>,
    Path(entry_id): Path<String>,
    payload: Result<Json<EditEntryForm>, JsonRejection>,
) -> Result<Json<EntryView>, Error> {
    let entry_id = parse_entry_id(&entry_id)?;
    let form = json_body(payload)?;
    let amount: Amount = form.amount.parse()?;

    let connection = state.database.connect()?;
    let entry = get_entry(entry_id, &connection)?;
    if entry.deleted_at.is_some() {
        return Err(Error::NotFound);
    }

    let new_entry = form.into_new_entry(amount, entry.entry_type)?;
    update_entry(entry_id, &new_entry, &connection)?;

    let updated = get_entry(entry_id, &connection)?;
    tracing::info!("updated {} entry {entry_id}", updated.entry_type);

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::Role,
        endpoints::{self, format_endpoint},
        ledger::{EntryView, soft_delete_entry},
        test_utils::TestApp,
    };

    #[tokio::test]
    async fn corrects_donation() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);
        let entry_id = app.create_donation(&token, "r1", "100.00").await;

        let response = app
            .server
            .patch(&format_endpoint(endpoints::LEDGER_ENTRY, entry_id))
            .authorization_bearer(&token)
            .json(&json!({
                "amount": "80",
                "donor": "Alice Smith",
                "donatedAt": "2024-02-01",
            }))
            .await;

        response.assert_status_ok();
        let view: EntryView = response.json();
        assert_eq!(view.id, entry_id);
        assert_eq!(view.amount, "80.00");
        assert_eq!(view.description, "donor=Alice Smith");
        assert_eq!(view.month_key, "2024-02");
    }

    #[tokio::test]
    async fn corrects_expense_with_expense_fields() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);
        let entry_id = app.create_expense(&token, "e1", "10.00").await;

        let response = app
            .server
            .patch(&format_endpoint(endpoints::LEDGER_ENTRY, entry_id))
            .authorization_bearer(&token)
            .json(&json!({
                "amount": "12.50",
                "donor": "ignored",
                "purpose": "Cat food",
                "occurredAt": "2024-01-20",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "handledBy is required" }));
    }

    #[tokio::test]
    async fn rejects_invalid_amount_before_lookup() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);

        let response = app
            .server
            .patch(&format_endpoint(endpoints::LEDGER_ENTRY, 999))
            .authorization_bearer(&token)
            .json(&json!({ "amount": "0" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "amount must be greater than 0" }));
    }

    #[tokio::test]
    async fn missing_and_deleted_entries_are_not_found() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);
        let entry_id = app.create_donation(&token, "r1", "100.00").await;
        let body = json!({ "amount": "1", "donor": "Alice", "donatedAt": "2024-01-15" });

        app.server
            .patch(&format_endpoint(endpoints::LEDGER_ENTRY, entry_id + 1))
            .authorization_bearer(&token)
            .json(&body)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let connection = app.state.database.connect().unwrap();
        let admin = app.user_id("0900000001");
        soft_delete_entry(entry_id, admin, &connection).unwrap();

        let response = app
            .server
            .patch(&format_endpoint(endpoints::LEDGER_ENTRY, entry_id))
            .authorization_bearer(&token)
            .json(&body)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "entry not found" }));
    }

    #[tokio::test]
    async fn rejects_invalid_entry_id() {
        let app = TestApp::new();
        let token = app.access_token_for("0900000001", Role::Admin);

        let response = app
            .server
            .patch("/api/ledger/entries/abc")
            .authorization_bearer(&token)
            .json(&json!({ "amount": "1" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "invalid entry id" }));
    }
}
