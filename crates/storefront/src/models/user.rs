//! Admin user domain type.

use crochet_core::UserId;
use serde::{Deserialize, Serialize};

/// An admin account. The password hash never leaves the repository layer
/// except for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: UserId,
    pub username: String,
}
