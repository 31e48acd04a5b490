//! Who an order belongs to.

use serde::{Deserialize, Serialize};

use super::{Email, UserId};

/// Contact details captured for an order placed without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
}

/// The purchaser of an order: either a registered account or a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Purchaser {
    Registered { user_id: UserId },
    Guest(GuestContact),
}

impl Purchaser {
    /// The owning account, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Registered { user_id } => Some(*user_id),
            Self::Guest(_) => None,
        }
    }

    /// Guest contact details, if this is a guest order.
    #[must_use]
    pub const fn guest(&self) -> Option<&GuestContact> {
        match self {
            Self::Registered { .. } => None,
            Self::Guest(contact) => Some(contact),
        }
    }

    /// Whether `user` owns an order with this purchaser.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id() == Some(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_is_owned_by_nobody() {
        let guest = Purchaser::Guest(GuestContact {
            name: "Sari".to_owned(),
            email: Email::parse("sari@example.id").unwrap(),
            phone: "0812".to_owned(),
            address: "Jl. Merdeka 1".to_owned(),
        });
        assert!(!guest.is_owned_by(UserId::generate()));
        assert!(guest.user_id().is_none());
    }

    #[test]
    fn test_registered_ownership() {
        let user = UserId::generate();
        let purchaser = Purchaser::Registered { user_id: user };
        assert!(purchaser.is_owned_by(user));
        assert!(!purchaser.is_owned_by(UserId::generate()));
        assert!(purchaser.guest().is_none());
    }
}
