//! Process-wide configuration.
//! The signing secret is a required field: construction fails when it is
//! absent or empty, never substituting a well-known default.

use anyhow::{Result, anyhow};

/// Default lifetime of a signed bearer token.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Default lifetime of a password-reset token.
pub const DEFAULT_RESET_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Secret for signing bearer tokens. Required; no fallback.
    pub token_secret: String,
    /// Bearer token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// Password-reset token lifetime in seconds.
    pub reset_ttl_secs: i64,
    /// When true, accepting a friend request requires a pending entry from
    /// the requester. The default mirrors the lax legacy behavior: accept
    /// succeeds even without a prior request.
    pub strict_accept: bool,
}

impl Config {
    pub fn new<S: Into<String>>(token_secret: S) -> Result<Self> {
        let token_secret = token_secret.into();
        if token_secret.trim().is_empty() {
            return Err(anyhow!("token signing secret must not be empty"));
        }
        Ok(Self {
            token_secret,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            reset_ttl_secs: DEFAULT_RESET_TTL_SECS,
            strict_accept: false,
        })
    }

    /// Read configuration from the environment. Fails fast when
    /// `COHORT_TOKEN_SECRET` is unset so a misconfigured deployment cannot
    /// start with a guessable signing key.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("COHORT_TOKEN_SECRET")
            .map_err(|_| anyhow!("COHORT_TOKEN_SECRET is not set"))?;
        let mut cfg = Self::new(secret)?;
        if let Ok(v) = std::env::var("COHORT_TOKEN_TTL_SECS") {
            if let Ok(n) = v.parse() { cfg.token_ttl_secs = n; }
        }
        if let Ok(v) = std::env::var("COHORT_RESET_TTL_SECS") {
            if let Ok(n) = v.parse() { cfg.reset_ttl_secs = n; }
        }
        if let Ok(v) = std::env::var("COHORT_STRICT_ACCEPT") {
            cfg.strict_accept = v == "1" || v.eq_ignore_ascii_case("true");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_rejected() {
        assert!(Config::new("").is_err());
        assert!(Config::new("   ").is_err());
        assert!(Config::new("s3cret").is_ok());
    }

    #[test]
    fn defaults() {
        let cfg = Config::new("s3cret").unwrap();
        assert_eq!(cfg.token_ttl_secs, 3600);
        assert_eq!(cfg.reset_ttl_secs, 600);
        assert!(!cfg.strict_accept);
    }
}
