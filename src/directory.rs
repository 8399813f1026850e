//! Read-only identity search.

use crate::error::{AppError, AppResult};
use crate::storage::{IdentityStore, PublicUser};

/// Case-insensitive substring match against username or email. Results are
/// projections only; hashes and tokens are never exposed.
pub fn search(store: &dyn IdentityStore, query: &str) -> AppResult<Vec<PublicUser>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(AppError::validation("invalid_query", "invalid search query"));
    }
    let users = store.list_all().map_err(AppError::from)?;
    Ok(users
        .iter()
        .filter(|u| {
            u.username.to_lowercase().contains(&needle) || u.email.to_lowercase().contains(&needle)
        })
        .map(|u| u.public())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UserRecord};
    use chrono::Utc;

    fn seed(store: &MemoryStore, username: &str, email: &str) {
        store
            .create(UserRecord::new(
                username.to_string(),
                email.to_string(),
                "$argon2id$fake".to_string(),
                format!("vtok-{username}"),
                Utc::now(),
            ))
            .unwrap();
    }

    #[test]
    fn empty_query_is_rejected() {
        let store = MemoryStore::new();
        assert_eq!(search(&store, "").unwrap_err().http_status(), 400);
        assert_eq!(search(&store, "   ").unwrap_err().http_status(), 400);
    }

    #[test]
    fn matches_username_and_email_case_insensitively() {
        let store = MemoryStore::new();
        seed(&store, "alice", "alice@example.com");
        seed(&store, "bob", "bob@other.net");
        seed(&store, "carol", "carol@example.com");

        let hits = search(&store, "ALI").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "alice");

        // Email substring matches too
        let hits = search(&store, "example.com").unwrap();
        assert_eq!(hits.len(), 2);

        assert!(search(&store, "zebra").unwrap().is_empty());
    }
}
