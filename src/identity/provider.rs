//! Registration, login, and profile maintenance.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::mailer::{Mail, Mailer};
use crate::security;
use crate::storage::{IdentityStore, PublicUser, UserRecord};
use crate::tprintln;
use uuid::Uuid;

use super::token::TokenIssuer;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 8;

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Optional field changes for a profile update. The password is re-hashed
/// only when one is actually supplied; an update that leaves the password
/// untouched never re-hashes the stored digest.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    issuer: Arc<TokenIssuer>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self { store, mailer, clock, issuer }
    }

    /// Create an identity: hash the password, generate the email
    /// verification token, store the record, and mail the token out.
    /// Returns a bearer token for immediate (pre-verification) use.
    pub fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&req.password)?;

        let username_taken = self
            .store
            .find_by_username(&username)
            .map_err(AppError::from)?
            .is_some();
        let email_taken = self
            .store
            .find_by_email(&email)
            .map_err(AppError::from)?
            .is_some();
        if username_taken || email_taken {
            return Err(AppError::conflict(
                "identity_exists",
                "username or email already exists",
            ));
        }

        let password_hash = security::hash_password(&req.password).map_err(AppError::from)?;
        let verification_token = security::generate_token().map_err(AppError::from)?;
        let record = UserRecord::new(
            username,
            email,
            password_hash,
            verification_token.clone(),
            self.clock.now(),
        );
        self.store.create(record.clone()).map_err(AppError::from)?;

        // Fire-and-forget: a failed send never rolls back the registration.
        let mail = Mail {
            to: record.email.clone(),
            subject: "Email Verification".to_string(),
            html_body: format!(
                "<h1>Email Verification</h1>\
                 <p>Please click the link below to verify your email:</p>\
                 <a href=\"verify-email?token={}\">Verify Email</a>",
                verification_token
            ),
        };
        if let Err(e) = self.mailer.send(mail) {
            warn!(user = %record.username, "verification mail not delivered: {e}");
        }

        let token = self.issuer.issue(&record)?;
        tprintln!("auth.register user={} id={}", record.username, record.id);
        Ok(LoginResponse { token, user: record.public() })
    }

    /// Authenticate by username and password. Unknown user, wrong password,
    /// and unverified email all surface the same undifferentiated failure.
    pub fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let user = match self
            .store
            .find_by_username(req.username.trim())
            .map_err(AppError::from)?
        {
            Some(u) => u,
            None => return Err(invalid_credentials()),
        };
        if !user.email_verified {
            return Err(invalid_credentials());
        }
        if !security::verify_password(&user.password_hash, &req.password) {
            return Err(invalid_credentials());
        }
        let token = self.issuer.issue(&user)?;
        tprintln!("auth.login user={} id={}", user.username, user.id);
        Ok(LoginResponse { token, user: user.public() })
    }

    /// Apply optional profile changes. Uniqueness is re-checked for a
    /// changed username or email; the password digest is replaced only when
    /// a new password is supplied.
    pub fn update_profile(&self, id: Uuid, changes: &ProfileUpdate) -> AppResult<PublicUser> {
        let mut user = self
            .store
            .find_by_id(id)
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("user_not_found", "user not found"))?;

        if let Some(username) = &changes.username {
            let username = username.trim().to_string();
            if username != user.username {
                validate_username(&username)?;
                if self
                    .store
                    .find_by_username(&username)
                    .map_err(AppError::from)?
                    .is_some()
                {
                    return Err(AppError::conflict("username_taken", "username already exists"));
                }
                user.username = username;
            }
        }
        if let Some(email) = &changes.email {
            let email = email.trim().to_lowercase();
            if email != user.email {
                validate_email(&email)?;
                if self.store.find_by_email(&email).map_err(AppError::from)?.is_some() {
                    return Err(AppError::conflict("email_taken", "email already exists"));
                }
                user.email = email;
            }
        }
        if let Some(password) = &changes.password {
            validate_password(password)?;
            user.password_hash = security::hash_password(password).map_err(AppError::from)?;
        }
        user.updated_at = self.clock.now();
        self.store.save(&user).map_err(AppError::from)?;
        Ok(user.public())
    }
}

fn invalid_credentials() -> AppError {
    AppError::validation("invalid_credentials", "invalid credentials")
}

fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        return Err(AppError::validation(
            "invalid_username",
            "username must be 3-30 characters",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::validation("invalid_email", "please use a valid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::validation(
            "invalid_password",
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}
