//! Ownership-based authorization, decoupled from the HTTP layer.
//!
//! Every mutating handler builds an [`Action`] carrying the owner ids
//! of the rows it is about to touch and asks [`authorize`] before any
//! write happens. Unauthenticated requests never reach this crate; the
//! bearer-token middleware rejects them with 401 first.

use uuid::Uuid;

use agora_types::models::Role;

/// The authenticated caller: account id plus role, nothing else.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: Role,
}

/// Mutating actions and the ownership facts each rule needs.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    UpdateAccount { owner: Uuid },
    UpdatePost { owner: Uuid },
    DestroyPost { owner: Uuid },
    UpdateComment { author: Uuid },
    DestroyComment { author: Uuid, post_owner: Uuid },
    UpdateReaction { owner: Uuid },
    DestroyReaction { owner: Uuid },
    UpdateVote { owner: Uuid },
    DestroyVote { owner: Uuid },
    /// Surveys (polls) and their options are curated content.
    CreatePoll,
    ManagePollOptions,
    ClosePoll { post_owner: Uuid },
    SendMessage { first_user: Uuid, second_user: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn authorize(principal: &Principal, action: &Action) -> Decision {
    let me = principal.account_id;
    let admin = principal.role.is_admin();

    let allowed = match *action {
        Action::UpdateAccount { owner } => me == owner,
        // Only admins may remove someone else's post; edits stay owner-only.
        Action::UpdatePost { owner } => me == owner,
        Action::DestroyPost { owner } => me == owner || admin,
        Action::UpdateComment { author } => me == author,
        // Content owners may moderate comments under their own posts.
        Action::DestroyComment { author, post_owner } => {
            me == author || me == post_owner || admin
        }
        Action::UpdateReaction { owner } | Action::DestroyReaction { owner } => me == owner,
        Action::UpdateVote { owner } | Action::DestroyVote { owner } => me == owner,
        Action::CreatePoll | Action::ManagePollOptions => admin,
        Action::ClosePoll { post_owner } => me == post_owner || admin,
        Action::SendMessage {
            first_user,
            second_user,
        } => me == first_user || me == second_user,
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Uuid) -> Principal {
        Principal {
            account_id: id,
            role: Role::User,
        }
    }

    fn admin(id: Uuid) -> Principal {
        Principal {
            account_id: id,
            role: Role::Admin,
        }
    }

    #[test]
    fn comment_destroy_rules() {
        let author = Uuid::new_v4();
        let post_owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let action = Action::DestroyComment { author, post_owner };

        assert_eq!(authorize(&user(author), &action), Decision::Allow);
        assert_eq!(authorize(&user(post_owner), &action), Decision::Allow);
        assert_eq!(authorize(&admin(stranger), &action), Decision::Allow);
        assert_eq!(authorize(&user(stranger), &action), Decision::Deny);
    }

    #[test]
    fn comment_update_is_author_only() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();
        let action = Action::UpdateComment { author };

        assert_eq!(authorize(&user(author), &action), Decision::Allow);
        // Not even an admin can rewrite someone's words.
        assert_eq!(authorize(&admin(other), &action), Decision::Deny);
    }

    #[test]
    fn post_destroy_allows_admin_but_update_does_not() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(
            authorize(&admin(other), &Action::DestroyPost { owner }),
            Decision::Allow
        );
        assert_eq!(
            authorize(&admin(other), &Action::UpdatePost { owner }),
            Decision::Deny
        );
        assert_eq!(
            authorize(&user(owner), &Action::UpdatePost { owner }),
            Decision::Allow
        );
    }

    #[test]
    fn reaction_and_vote_rows_are_owner_only() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        for action in [
            Action::UpdateReaction { owner },
            Action::DestroyReaction { owner },
            Action::UpdateVote { owner },
            Action::DestroyVote { owner },
        ] {
            assert_eq!(authorize(&user(owner), &action), Decision::Allow);
            assert_eq!(authorize(&admin(other), &action), Decision::Deny);
        }
    }

    #[test]
    fn poll_creation_is_admin_only() {
        let someone = Uuid::new_v4();
        assert_eq!(authorize(&user(someone), &Action::CreatePoll), Decision::Deny);
        assert_eq!(authorize(&admin(someone), &Action::CreatePoll), Decision::Allow);
        assert_eq!(
            authorize(&user(someone), &Action::ManagePollOptions),
            Decision::Deny
        );
    }

    #[test]
    fn room_messages_require_membership() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let action = Action::SendMessage {
            first_user: a,
            second_user: b,
        };

        assert_eq!(authorize(&user(a), &action), Decision::Allow);
        assert_eq!(authorize(&user(b), &action), Decision::Allow);
        assert_eq!(authorize(&user(outsider), &action), Decision::Deny);
        // Admins read the admin screens, not other people's chats.
        assert_eq!(authorize(&admin(outsider), &action), Decision::Deny);
    }
}
