//! Single-use tokens: email verification and password reset.
//!
//! Both kinds follow the same state machine per identity,
//! `absent -> issued -> absent`, ending either by redemption or by passive
//! expiry; reissuing overwrites in place, which implicitly invalidates the
//! previous token. Redemption is delegated to the store's conditional claim
//! primitives so that two simultaneous redemptions of the same token yield
//! exactly one success.
//!
//! The verification token is stored plaintext on the record; the reset token
//! is stored only as a SHA-256 digest with an absolute deadline, and the raw
//! value exists solely in the outbound mail.

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::mailer::{Mail, Mailer};
use crate::security;
use crate::storage::{IdentityStore, UserRecord};
use crate::tprintln;

use super::token::TokenIssuer;

pub struct SingleUseTokens {
    store: Arc<dyn IdentityStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    issuer: Arc<TokenIssuer>,
    reset_ttl_secs: i64,
}

impl SingleUseTokens {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        issuer: Arc<TokenIssuer>,
        reset_ttl_secs: i64,
    ) -> Self {
        Self { store, mailer, clock, issuer, reset_ttl_secs }
    }

    /// Redeem an email-verification token: exactly one caller succeeds per
    /// issued token. On success the identity is marked verified, the token
    /// cleared, and a fresh bearer token returned for immediate sign-in.
    pub fn redeem_verification(&self, token: &str) -> AppResult<(UserRecord, String)> {
        if token.is_empty() {
            return Err(invalid_single_use());
        }
        let user = self
            .store
            .claim_verification_token(token)
            .map_err(AppError::from)?
            .ok_or_else(invalid_single_use)?;
        let bearer = self.issuer.issue(&user)?;
        tprintln!("verify.redeem user={} id={}", user.username, user.id);
        Ok((user, bearer))
    }

    /// Issue a password-reset token for the identity behind `email`. Only a
    /// digest of the token is persisted, together with a deadline
    /// `reset_ttl_secs` out (ten minutes by default); the raw value goes out
    /// by mail and is never stored.
    pub fn request_reset(&self, email: &str) -> AppResult<()> {
        let mut user = self
            .store
            .find_by_email(email)
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("user_not_found", "user not found"))?;

        let raw = security::generate_token().map_err(AppError::from)?;
        let now = self.clock.now();
        user.reset_password_token_hash = Some(security::sha256_hex(&raw));
        user.reset_password_expires_at = Some(now + Duration::seconds(self.reset_ttl_secs));
        user.updated_at = now;
        self.store.save(&user).map_err(AppError::from)?;

        let mail = Mail {
            to: user.email.clone(),
            subject: "Password Reset Request".to_string(),
            html_body: format!(
                "<h1>Password Reset Request</h1>\
                 <p>Please click the link below to reset your password:</p>\
                 <a href=\"reset-password?token={}\">Reset Password</a>",
                raw
            ),
        };
        if let Err(e) = self.mailer.send(mail) {
            warn!(user = %user.username, "reset mail not delivered: {e}");
        }
        tprintln!("reset.request user={} id={}", user.username, user.id);
        Ok(())
    }

    /// Redeem a reset token and set a new password. The incoming raw value
    /// is digested with the same function the generate path used; a claim
    /// succeeds only while the stored digest matches and the deadline has
    /// not passed, and at most once per issued token.
    pub fn redeem_reset(&self, raw_token: &str, new_password: &str) -> AppResult<()> {
        if raw_token.is_empty() {
            return Err(invalid_single_use());
        }
        if new_password.chars().count() < 8 {
            return Err(AppError::validation(
                "invalid_password",
                "password must be at least 8 characters",
            ));
        }
        let digest = security::sha256_hex(raw_token);
        let mut user = self
            .store
            .claim_reset_token(&digest, self.clock.now())
            .map_err(AppError::from)?
            .ok_or_else(invalid_single_use)?;

        user.password_hash = security::hash_password(new_password).map_err(AppError::from)?;
        user.updated_at = self.clock.now();
        self.store.save(&user).map_err(AppError::from)?;
        tprintln!("reset.redeem user={} id={}", user.username, user.id);
        Ok(())
    }
}

fn invalid_single_use() -> AppError {
    // One opaque kind for unknown, already-used, and expired tokens alike.
    AppError::invalid_or_expired("invalid_or_expired_token", "token is invalid or expired")
}
