pub mod accounts;
pub mod comments;
pub mod polls;
pub mod posts;
pub mod reactions;
pub mod rooms;

use rusqlite::{Connection, OptionalExtension};

use crate::{StoreError, StoreResult};

/// The referenced account must exist and be active.
pub(crate) fn require_account(conn: &Connection, account_id: &str) -> StoreResult<()> {
    let active: Option<bool> = conn
        .query_row(
            "SELECT active FROM accounts WHERE id = ?1",
            [account_id],
            |row| row.get(0),
        )
        .optional()?;

    match active {
        Some(true) => Ok(()),
        _ => Err(StoreError::NotFound("account")),
    }
}

/// The referenced post must exist and be active; returns its owner.
pub(crate) fn require_active_post(conn: &Connection, post_id: &str) -> StoreResult<String> {
    let row: Option<(String, bool)> = conn
        .query_row(
            "SELECT account_id, active FROM posts WHERE id = ?1",
            [post_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((owner, true)) => Ok(owner),
        _ => Err(StoreError::NotFound("post")),
    }
}

/// Translate a UNIQUE-constraint failure into a typed Conflict; pass
/// every other sqlite error through untouched.
pub(crate) fn unique_to_conflict(err: rusqlite::Error, what: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(what.to_string())
        }
        _ => err.into(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use uuid::Uuid;

    use agora_types::models::Role;

    use crate::Database;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn seed_account(db: &Database, username: &str) -> String {
        seed_account_with_role(db, username, Role::User)
    }

    pub fn seed_account_with_role(db: &Database, username: &str, role: Role) -> String {
        let user_id = Uuid::new_v4().to_string();
        let account_id = Uuid::new_v4().to_string();
        db.create_account(&user_id, username, "hash", &account_id, None, None, None, role)
            .unwrap();
        account_id
    }

    pub fn seed_post(db: &Database, account_id: &str) -> String {
        let post_id = Uuid::new_v4().to_string();
        db.create_post(&post_id, account_id, "hello", None, None)
            .unwrap();
        post_id
    }
}
