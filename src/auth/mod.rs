//! Users, passwords, tokens and the middleware that guards routes by role.

mod admin;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod refresh_token;
mod register_user;
mod token;
mod user;

pub use admin::{AdminInitOutcome, admin_ping, init_admin_endpoint, init_first_admin};
pub use log_in::{LoginState, RefreshTokenForm, log_in, refresh_tokens};
pub use log_out::log_out;
pub use middleware::{AuthState, admin_guard, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};
pub use refresh_token::{
    create_refresh_token_table, hash_token, is_refresh_token_active, revoke_refresh_token,
    store_refresh_token,
};
pub use register_user::{CredentialsForm, RegisteredUser, RegistrationState, register_user};
pub use token::{AuthUser, Claims, IssuedTokens, TokenKind, TokenManager, TokenPair};
pub use user::{
    Role, User, UserID, count_admins, create_user, create_user_table, get_user_by_id,
    get_user_by_phone, set_role,
};
