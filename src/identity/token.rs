//! Signed bearer tokens.
//! Stateless: validity is entirely signature plus expiry, with no
//! server-side revocation list. Expired tokens require a new login.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::storage::{IdentityStore, UserRecord};

/// Claim set carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.token_secret.as_bytes()),
            ttl_secs: config.token_ttl_secs,
            clock,
        }
    }

    /// Sign a token for the given identity, expiring `token_ttl_secs` from
    /// now (one hour by default).
    pub fn issue(&self, user: &UserRecord) -> AppResult<String> {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::internal("token_sign_failed", e.to_string().as_str()))
    }

    /// Check signature and expiry. The failure is a single opaque kind: the
    /// caller is never told whether the signature, shape, or expiry was the
    /// problem.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        // Expiry is checked against our clock collaborator with zero leeway,
        // not against jsonwebtoken's wall-clock reading.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| invalid_token())?;
        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(invalid_token());
        }
        Ok(data.claims)
    }

    /// Verify, then load the identity behind the claims.
    pub fn resolve(&self, token: &str, store: &dyn IdentityStore) -> AppResult<UserRecord> {
        let claims = self.verify(token)?;
        store
            .find_by_id(claims.sub)
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("user_not_found", "user no longer exists"))
    }
}

fn invalid_token() -> AppError {
    AppError::invalid_or_expired("invalid_token", "token is not valid")
}
