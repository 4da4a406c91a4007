//! Passwordless "my orders" login token.

use chrono::{DateTime, Utc};

use crochet_core::{Email, MagicToken};

/// A token granting read access to every order placed with `email`.
///
/// Valid for any number of uses until `expires_at`.
#[derive(Debug, Clone)]
pub struct LoginToken {
    pub token: MagicToken,
    pub email: Email,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LoginToken {
    /// A token is accepted strictly before its expiry instant.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
