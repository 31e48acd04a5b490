//! User accounts and authenticated identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nexora_core::{Email, Role, UserId};

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    /// Whether the account can sign in with a password.
    pub has_password: bool,
    /// Whether the account is linked to Google sign-in.
    pub has_google: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller behind a verified bearer token.
///
/// Passed explicitly into every service call that depends on who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
