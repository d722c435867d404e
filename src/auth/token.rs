//! Issuing and verifying the JSON web tokens used for authentication.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Role, User, UserID},
};

/// Whether a token grants API access or may only be exchanged for new tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// A short-lived token sent as a bearer token with API requests.
    Access,
    /// A long-lived token that can be exchanged once for a new token pair.
    Refresh,
}

/// The claims carried by both kinds of token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The user ID as a string.
    pub sub: String,
    /// The phone number of the user.
    pub phone: String,
    /// The role of the user when the token was issued.
    pub role: Role,
    /// Which kind of token this is.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// When the token was issued, in seconds since the Unix epoch.
    pub iat: i64,
    /// When the token expires, in seconds since the Unix epoch.
    pub exp: i64,
    /// A random ID that makes every refresh token unique.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    fn user_id(&self) -> Result<UserID, Error> {
        self.sub
            .parse()
            .map(UserID::new)
            .map_err(|_| Error::Unauthorized("invalid token subject"))
    }
}

/// The authenticated caller of a request, as read from their access token.
///
/// The auth guard inserts this into the request extensions, so route handlers can use
/// `Extension(user): Extension<AuthUser>` to receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// The ID of the user.
    pub id: UserID,
    /// The phone number of the user.
    pub phone: String,
    /// The role of the user.
    pub role: Role,
}

/// The tokens returned to a client when they log in or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// The token to send as a bearer token.
    pub access_token: String,
    /// The token to exchange for a new pair.
    pub refresh_token: String,
}

/// A freshly signed token pair and when its refresh token expires.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// The signed tokens.
    pub pair: TokenPair,
    /// When the refresh token in `pair` expires.
    pub refresh_expires_at: OffsetDateTime,
}

/// Signs and verifies tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a token manager that signs tokens with `secret`.
    pub fn new(secret: &str, access_token_ttl: Duration, refresh_token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_ttl,
            refresh_token_ttl,
        }
    }

    /// Sign a new access and refresh token for `user`.
    ///
    /// # Errors
    /// Returns [Error::TokenCreation] if a token could not be signed.
    pub fn issue(&self, user: &User) -> Result<IssuedTokens, Error> {
        let now = OffsetDateTime::now_utc();
        let refresh_expires_at = now + self.refresh_token_ttl;

        let access_claims = Claims {
            sub: user.id.to_string(),
            phone: user.phone.clone(),
            role: user.role,
            kind: TokenKind::Access,
            iat: now.unix_timestamp(),
            exp: (now + self.access_token_ttl).unix_timestamp(),
            jti: None,
        };
        let refresh_claims = Claims {
            kind: TokenKind::Refresh,
            exp: refresh_expires_at.unix_timestamp(),
            jti: Some(hex::encode(rand::random::<[u8; 16]>())),
            ..access_claims.clone()
        };

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token: self.sign(&access_claims)?,
                refresh_token: self.sign(&refresh_claims)?,
            },
            refresh_expires_at,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|error| Error::TokenCreation(error.to_string()))
    }

    /// Check the signature and expiry of `token` and return its claims.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the token is malformed, forged or expired.
    pub fn decode(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|error| {
                tracing::debug!("rejected token: {error}");
                Error::Unauthorized("invalid token")
            })
    }

    /// Verify an access token and return the user it was issued to.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the token is invalid or is a refresh token.
    pub fn verify_access_token(&self, token: &str) -> Result<AuthUser, Error> {
        let claims = self.decode(token)?;

        if claims.kind != TokenKind::Access {
            return Err(Error::Unauthorized("invalid access token type"));
        }

        Ok(AuthUser {
            id: claims.user_id()?,
            phone: claims.phone,
            role: claims.role,
        })
    }

    /// Verify a refresh token and return the ID of the user it was issued to.
    ///
    /// This only checks the token itself. Callers must also check that the token has
    /// not been revoked.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the token is invalid or is an access token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<UserID, Error> {
        let claims = self
            .decode(token)
            .map_err(|_| Error::Unauthorized("invalid refresh token"))?;

        if claims.kind != TokenKind::Refresh {
            return Err(Error::Unauthorized("invalid refresh token type"));
        }

        claims.user_id()
    }
}
