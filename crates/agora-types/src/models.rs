use serde::{Deserialize, Serialize};

/// Stored reaction kinds. A reaction row is flipped between these in
/// place by the like toggle; it is never deleted once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_i64(self) -> i64 {
        match self {
            ReactionKind::Like => 1,
            ReactionKind::Dislike => 2,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(ReactionKind::Like),
            2 => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// Outcome of a like toggle, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionState {
    Liked,
    Unliked,
}

/// Outcome of casting a poll vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote by this account on this poll.
    Recorded,
    /// Existing vote repointed at a different option.
    Changed,
    /// Re-vote for the option already chosen; nothing written.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_kind_roundtrip() {
        assert_eq!(ReactionKind::from_i64(1), Some(ReactionKind::Like));
        assert_eq!(ReactionKind::from_i64(2), Some(ReactionKind::Dislike));
        assert_eq!(ReactionKind::from_i64(7), None);
        assert_eq!(ReactionKind::Dislike.as_i64(), 2);
    }

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("moderator"), None);
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }
}
