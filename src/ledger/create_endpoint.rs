//! Defines the endpoints for recording donations and expenses.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    Amount, Error,
    auth::AuthUser,
    database_id::EntryId,
    json_body,
    ledger::{
        EntryDetails, LedgerState, NewEntry, Operation, RequestId, WriteOutcome,
        create_entry_once,
    },
    timezone::parse_occurred_at,
};

/// The request header a client may send its request ID in.
pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

/// The response header set when an earlier request already created the entry.
pub const IDEMPOTENCY_REPLAYED: HeaderName = HeaderName::from_static("idempotency-replayed");

/// The request body for recording a donation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonationForm {
    /// The name of the donor.
    pub donor: String,
    /// When the donation was received, RFC 3339 or `YYYY-MM-DD`.
    pub donated_at: String,
    /// The amount as a decimal string.
    pub amount: String,
    /// The request ID, used when the `Idempotency-Key` header is absent.
    pub request_id: Option<String>,
}

/// The request body for recording an expense.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseForm {
    /// What the money was spent on.
    pub purpose: String,
    /// The amount as a decimal string.
    pub amount: String,
    /// The person who handled the payment.
    pub handled_by: String,
    /// When the money was spent, RFC 3339 or `YYYY-MM-DD`.
    pub occurred_at: String,
    /// The request ID, used when the `Idempotency-Key` header is absent.
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEntry {
    entry_id: EntryId,
}

fn request_id(headers: &HeaderMap, body: Option<&str>) -> Result<RequestId, Error> {
    let header = headers
        .get(IDEMPOTENCY_KEY)
        .map(|value| {
            value.to_str().map_err(|_| {
                Error::Validation("invalid Idempotency-Key header".to_owned())
            })
        })
        .transpose()?;

    RequestId::from_header_or_body(header, body)
}

fn created_response(outcome: WriteOutcome) -> Response {
    let mut response = (
        StatusCode::CREATED,
        Json(CreatedEntry {
            entry_id: outcome.entry_id,
        }),
    )
        .into_response();

    if outcome.replayed {
        response
            .headers_mut()
            .insert(IDEMPOTENCY_REPLAYED, HeaderValue::from_static("true"));
    }

    response
}

/// A route handler for recording a donation exactly once per request ID.
///
/// Responds with 201 Created and `{"entryId": ...}` both for new entries and for replays,
/// which also carry the `Idempotency-Replayed: true` header.
pub async fn create_donation_endpoint(
    State(state): State<LedgerState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    payload: Result<Json<DonationForm>, JsonRejection>,
) -> Result<Response, Error> {
    let form = json_body(payload)?;

    let details = EntryDetails::donation(&form.donor)?;
    let request_id = request_id(&headers, form.request_id.as_deref())?;
    let amount: Amount = form.amount.parse()?;
    let occurred_at = parse_occurred_at(&form.donated_at, "donatedAt")?;
    let new_entry = NewEntry {
        amount,
        occurred_at,
        details,
    };

    let mut connection = state.database.connect()?;
    let outcome = create_entry_once(
        &mut connection,
        &request_id,
        Operation::Donation,
        user.id,
        &new_entry,
    )?;

    Ok(created_response(outcome))
}

/// A route handler for recording an expense exactly once per request ID.
///
/// Behaves like [create_donation_endpoint].
pub async fn create_expense_endpoint(
    State(state): State<LedgerState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    payload: Result<Json<ExpenseForm>, JsonRejection>,
) -> Result<Response, Error> {
    let form = json_body(payload)?;

    let details = EntryDetails::expense(&form.purpose, &form.handled_by)?;
    let request_id = request_id(&headers, form.request_id.as_deref())?;
    let amount: Amount = form.amount.parse()?;
    let occurred_at = parse_occurred_at(&form.occurred_at, "occurredAt")?;
    let new_entry = NewEntry {
        amount,
        occurred_at,
        details,
    };

    let mut connection = state.database.connect()?;
    let outcome = create_entry_once(
        &mut connection,
        &request_id,
        Operation::Expense,
        user.id,
        &new_entry,
    )?;

    Ok(created_response(outcome))
}
