//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/ledger/entries/{entry_id}', use
//! [format_endpoint].

/// The root route, answers with the name of the service.
pub const ROOT: &str = "/";
/// The route for liveness checks.
pub const HEALTH: &str = "/health";

/// The route for registering a new member.
pub const REGISTER: &str = "/api/auth/register";
/// The route for logging in with a phone number and password.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for exchanging a refresh token for a new token pair.
pub const REFRESH: &str = "/api/auth/refresh";
/// The route for revoking a refresh token.
pub const LOG_OUT: &str = "/api/auth/logout";

/// The route for creating the first admin.
pub const ADMIN_INIT: &str = "/api/admin/init";
/// The route for admins to check their access token.
pub const ADMIN_PING: &str = "/api/admin/ping";

/// The route to record a donation.
pub const DONATIONS: &str = "/api/ledger/donations";
/// The route to record an expense.
pub const EXPENSES: &str = "/api/ledger/expenses";
/// The route to list ledger entries.
pub const LEDGER_ENTRIES: &str = "/api/ledger/entries";
/// The route to correct or delete a single ledger entry.
pub const LEDGER_ENTRY: &str = "/api/ledger/entries/{entry_id}";
/// The route to check an amount before submitting an entry.
pub const VALIDATE_AMOUNT: &str = "/api/ledger/validate-amount";
/// The route for the monthly totals.
pub const SUMMARY: &str = "/api/summary";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
