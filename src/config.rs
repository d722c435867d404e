//! Command line and environment configuration shared by the binaries.

use std::path::PathBuf;

use clap::{Args, Parser};
use time::Duration;

/// The REST API server for the pet-rescue ledger.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The address to listen on.
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "APP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// File path to append debug logs to. Debug logs are not written to file if omitted.
    #[arg(long, env = "LOG_PATH")]
    pub log_path: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub tokens: TokenConfig,

    #[command(flatten)]
    pub admin_init: AdminInitConfig,
}

/// Where to find the application database.
#[derive(Args, Debug, Clone)]
pub struct DatabaseConfig {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH", default_value = "pet_rescue.db")]
    pub db_path: PathBuf,
}

/// Settings for signing and expiring JSON web tokens.
#[derive(Args, Clone)]
pub struct TokenConfig {
    /// The secret used to sign access and refresh tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// How long access tokens are valid for, in minutes.
    #[arg(long, env = "ACCESS_TOKEN_TTL_MIN", default_value_t = 15)]
    pub access_token_ttl_min: i64,

    /// How long refresh tokens are valid for, in hours.
    #[arg(long, env = "REFRESH_TOKEN_TTL_HOUR", default_value_t = 168)]
    pub refresh_token_ttl_hour: i64,
}

impl TokenConfig {
    /// The lifetime of an access token.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_min)
    }

    /// The lifetime of a refresh token.
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::hours(self.refresh_token_ttl_hour)
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("jwt_secret", &"********")
            .field("access_token_ttl_min", &self.access_token_ttl_min)
            .field("refresh_token_ttl_hour", &self.refresh_token_ttl_hour)
            .finish()
    }
}

/// Credentials for creating the first admin when the server starts.
#[derive(Args, Clone)]
pub struct AdminInitConfig {
    /// Create the first admin on start-up if no admin exists yet.
    #[arg(long, env = "ADMIN_INIT_ENABLED", default_value_t = false)]
    pub admin_init_enabled: bool,

    /// The phone number of the first admin.
    #[arg(long, env = "ADMIN_INIT_PHONE", default_value = "")]
    pub admin_init_phone: String,

    /// The password of the first admin.
    #[arg(long, env = "ADMIN_INIT_PASSWORD", default_value = "", hide_env_values = true)]
    pub admin_init_password: String,
}

impl std::fmt::Debug for AdminInitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminInitConfig")
            .field("admin_init_enabled", &self.admin_init_enabled)
            .field("admin_init_phone", &self.admin_init_phone)
            .field("admin_init_password", &"********")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::config::Config;

    #[test]
    fn parses_defaults() {
        let config = Config::try_parse_from(["server", "--jwt-secret", "foobar"]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database.db_path.to_str(), Some("pet_rescue.db"));
        assert_eq!(config.tokens.access_token_ttl().whole_minutes(), 15);
        assert_eq!(config.tokens.refresh_token_ttl().whole_hours(), 168);
        assert!(!config.admin_init.admin_init_enabled);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config::try_parse_from([
            "server",
            "--jwt-secret",
            "supersecret",
            "--admin-init-password",
            "hunter2hunter2",
        ])
        .unwrap();

        let debug = format!("{config:?}");

        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("hunter2hunter2"));
    }
}
