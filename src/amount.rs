//! Validated monetary amounts and the endpoint that lets clients pre-check them.

use std::{fmt::Display, str::FromStr};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::{Error, json_body};

/// The number of fractional digits amounts are stored with.
const AMOUNT_SCALE: u32 = 2;

/// A positive amount of money with at most two decimal places.
///
/// Amounts are normalized to exactly two decimal places, so "5" and "5.0"
/// both become "5.00". Use [str::parse] to validate client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount from a whole number of cents without validation.
    ///
    /// The caller should ensure that `cents` is positive, e.g. because it was
    /// read from a column with a `CHECK (amount_cents > 0)` constraint.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, AMOUNT_SCALE))
    }

    /// The amount as a whole number of cents.
    pub fn cents(&self) -> i64 {
        // Parsing guarantees the mantissa at scale 2 fits in an i64.
        self.0.mantissa() as i64
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let amount = raw.trim();
        if amount.is_empty() {
            return Err(Error::Validation("amount is required".to_owned()));
        }

        if !is_plain_decimal(amount) {
            return Err(Error::Validation(
                "amount must be a valid decimal".to_owned(),
            ));
        }

        let parsed = Decimal::from_str(amount)
            .map_err(|_| Error::Validation("amount must be a valid decimal".to_owned()))?;

        if parsed <= Decimal::ZERO {
            return Err(Error::Validation(
                "amount must be greater than 0".to_owned(),
            ));
        }

        if parsed.scale() > AMOUNT_SCALE {
            return Err(Error::Validation(
                "amount must have at most 2 decimal places".to_owned(),
            ));
        }

        let mut normalized = parsed;
        normalized.rescale(AMOUNT_SCALE);

        if i64::try_from(normalized.mantissa()).is_err() {
            return Err(Error::Validation("amount is too large".to_owned()));
        }

        Ok(Self(normalized))
    }
}

/// Whether `text` is an optionally signed run of ASCII digits with at most one decimal point.
///
/// `Decimal::from_str` also skips underscores, so "1_000" must be rejected up front.
fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    !(whole.is_empty() && fraction.is_empty())
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.bytes().all(|byte| byte.is_ascii_digit())
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Format a signed number of cents as a two decimal string, e.g. `-500` as "-5.00".
///
/// Used for totals and balances, which unlike [Amount] may be zero or negative.
pub fn format_cents(cents: i64) -> String {
    Decimal::new(cents, AMOUNT_SCALE).to_string()
}

/// The request body for checking an amount.
#[derive(Debug, Deserialize)]
pub struct AmountValidationForm {
    #[serde(default)]
    amount: String,
}

/// A route handler that checks whether an amount would be accepted for a ledger entry.
///
/// Responds with 204 No Content if the amount is valid, otherwise 400 with the reason.
pub async fn validate_amount_endpoint(
    payload: Result<Json<AmountValidationForm>, JsonRejection>,
) -> Response {
    let form = match json_body(payload) {
        Ok(form) => form,
        Err(error) => return error.into_response(),
    };

    match form.amount.parse::<Amount>() {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}
