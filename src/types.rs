use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

record_id!(UserId);
record_id!(PolicyId);
record_id!(HistoryId);
record_id!(ClaimId);
record_id!(EvidenceId);
record_id!(DepositId);
record_id!(WithdrawalId);
record_id!(SnapshotId);

/// Monetary amounts are integral minor units (e.g. USD cents).
pub type Amount = u64;

/// The authenticated caller of a core operation.
/// Credentials are verified upstream; the core only checks the actor's
/// relationship to the entity it is touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    #[serde(default)]
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: UserId) -> Self {
        Actor { user_id, is_admin: false }
    }

    pub fn admin(user_id: UserId) -> Self {
        Actor { user_id, is_admin: true }
    }
}

/// Offset/limit window applied to list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Page { skip: 0, limit }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.skip).take(self.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&PolicyId(7)).unwrap();
        assert_eq!(json, "7");
        let back: ClaimId = serde_json::from_str("12").unwrap();
        assert_eq!(back, ClaimId(12));
    }

    #[test]
    fn actor_admin_flag_defaults_to_false() {
        let actor: Actor = serde_json::from_str(r#"{"user_id":3}"#).unwrap();
        assert_eq!(actor, Actor::user(UserId(3)));
    }

    #[test]
    fn page_skips_then_limits() {
        let page = Page { skip: 2, limit: 3 };
        assert_eq!(page.apply((0..10).collect()), vec![2, 3, 4]);
        assert!(Page { skip: 20, limit: 5 }.apply(vec![1, 2]).is_empty());
    }
}
