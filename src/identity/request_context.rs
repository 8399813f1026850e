//! Explicit per-request identity.
//! The resolved principal is threaded into operations as a value, never
//! stashed in ambient global state.

use crate::error::{AppError, AppResult};
use crate::storage::IdentityStore;

use super::principal::Principal;
use super::token::TokenIssuer;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Resolve an `Authorization` header value into an authenticated
    /// context. A missing or malformed header is rejected before any store
    /// access happens.
    pub fn from_bearer(
        header: Option<&str>,
        issuer: &TokenIssuer,
        store: &dyn IdentityStore,
    ) -> AppResult<Self> {
        let header = header.ok_or_else(no_token)?;
        let token = header.strip_prefix("Bearer ").ok_or_else(no_token)?;
        let user = issuer.resolve(token, store)?;
        Ok(Self {
            principal: Some(Principal::from(&user)),
            request_id: None,
        })
    }

    pub fn require_principal(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::invalid_or_expired("not_authorized", "not authorized"))
    }
}

fn no_token() -> AppError {
    AppError::invalid_or_expired("no_token", "no token provided")
}
