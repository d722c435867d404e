//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        request, response,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many bytes are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Headers whose values never appear in logs.
const REDACTED_HEADERS: [axum::http::HeaderName; 3] = [AUTHORIZATION, COOKIE, SET_COOKIE];

/// JSON fields whose values never appear in logs.
const REDACTED_FIELDS: [&str; 3] = ["password", "accessToken", "refreshToken"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated and
/// the full body is logged at the `debug` level. Passwords and tokens in JSON
/// bodies and credential headers are replaced with asterisks before logging.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!("could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let body_text = String::from_utf8_lossy(&body_bytes);
    let display_text = if is_json(parts.headers.get(CONTENT_TYPE)) {
        redact_json(&body_text)
    } else {
        body_text.to_string()
    };
    log_body("Received request", &describe_request(&parts), &display_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body_text = String::from_utf8_lossy(&body_bytes);
    let display_text = if is_json(parts.headers.get(CONTENT_TYPE)) {
        redact_json(&body_text)
    } else {
        body_text.to_string()
    };
    log_body("Sending response", &describe_response(&parts), &display_text);

    Response::from_parts(parts, Body::from(body_bytes))
}

fn describe_request(parts: &request::Parts) -> String {
    format!(
        "{} {} {:?} headers: {:?}",
        parts.method,
        parts.uri,
        parts.version,
        redact_headers(&parts.headers)
    )
}

fn describe_response(parts: &response::Parts) -> String {
    format!(
        "{} headers: {:?}",
        parts.status,
        redact_headers(&parts.headers)
    )
}

/// A copy of `headers` with credential values masked.
fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut redacted = headers.clone();

    for name in REDACTED_HEADERS {
        if redacted.contains_key(&name) {
            redacted.insert(name, HeaderValue::from_static("********"));
        }
    }

    redacted
}

fn is_json(content_type: Option<&axum::http::HeaderValue>) -> bool {
    content_type
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Replace the values of sensitive fields in a JSON document.
///
/// Text that is not valid JSON is returned unchanged.
fn redact_json(text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(text) else {
        return text.to_owned();
    };

    redact_value(&mut value);
    value.to_string()
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String("********".to_owned());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

/// The longest prefix of `text` that is at most `limit` bytes and ends on a char boundary.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_body(message: &str, parts: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{message}: {parts}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{message}: {parts}\nbody: {body:?}");
    }
}
