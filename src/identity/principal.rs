use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::UserRecord;

/// Authenticated identity claims resolved from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for Principal {
    fn from(u: &UserRecord) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}
