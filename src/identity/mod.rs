//! Central identity and credential management for cohort.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod request_context;
mod single_use;
mod token;

pub use principal::Principal;
pub use provider::{AuthService, LoginRequest, LoginResponse, ProfileUpdate, RegisterRequest};
pub use request_context::RequestContext;
pub use single_use::SingleUseTokens;
pub use token::{Claims, TokenIssuer};
