use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use agora_types::models::{ReactionKind, ReactionState};

use crate::models::ReactionRow;
use crate::queries::{require_account, require_active_post};
use crate::{Database, StoreResult};

impl Database {
    /// The like toggle. One reaction row per (post, account), created
    /// on first touch and mutated in place forever after — the row is
    /// never deleted, so "who ever reacted" survives and the UNIQUE
    /// constraint makes a duplicate insert impossible. The whole
    /// read-modify-write runs in one transaction.
    pub fn toggle_like(&self, post_id: &str, account_id: &str) -> StoreResult<ReactionState> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_active_post(&tx, post_id)?;
            require_account(&tx, account_id)?;

            let existing: Option<(String, i64)> = tx
                .query_row(
                    "SELECT id, kind FROM reactions WHERE post_id = ?1 AND account_id = ?2",
                    params![post_id, account_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let state = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO reactions (id, post_id, account_id, kind)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            Uuid::new_v4().to_string(),
                            post_id,
                            account_id,
                            ReactionKind::Like.as_i64()
                        ],
                    )?;
                    ReactionState::Liked
                }
                Some((id, kind)) if kind == ReactionKind::Like.as_i64() => {
                    tx.execute(
                        "UPDATE reactions SET kind = ?2 WHERE id = ?1",
                        params![id, ReactionKind::Dislike.as_i64()],
                    )?;
                    ReactionState::Unliked
                }
                Some((id, _)) => {
                    tx.execute(
                        "UPDATE reactions SET kind = ?2 WHERE id = ?1",
                        params![id, ReactionKind::Like.as_i64()],
                    )?;
                    ReactionState::Liked
                }
            };

            tx.commit()?;
            Ok(state)
        })
    }

    pub fn find_reaction(
        &self,
        post_id: &str,
        account_id: &str,
    ) -> StoreResult<Option<ReactionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, post_id, account_id, kind
                     FROM reactions WHERE post_id = ?1 AND account_id = ?2",
                    params![post_id, account_id],
                    |row| {
                        Ok(ReactionRow {
                            id: row.get(0)?,
                            post_id: row.get(1)?,
                            account_id: row.get(2)?,
                            kind: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_likes(&self, post_id: &str) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM reactions WHERE post_id = ?1 AND kind = ?2",
                params![post_id, ReactionKind::Like.as_i64()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    #[cfg(test)]
    fn count_reaction_rows(&self, post_id: &str, account_id: &str) -> i64 {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM reactions WHERE post_id = ?1 AND account_id = ?2",
                params![post_id, account_id],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use agora_types::models::{ReactionKind, ReactionState};

    use crate::StoreError;
    use crate::queries::test_support::{db, seed_account, seed_post};

    #[test]
    fn toggle_walks_like_unlike_like() {
        let db = db();
        let account = seed_account(&db, "alice");
        let post = seed_post(&db, &account);

        assert_eq!(db.toggle_like(&post, &account).unwrap(), ReactionState::Liked);
        let row = db.find_reaction(&post, &account).unwrap().unwrap();
        assert_eq!(row.kind, ReactionKind::Like.as_i64());

        assert_eq!(db.toggle_like(&post, &account).unwrap(), ReactionState::Unliked);
        let row = db.find_reaction(&post, &account).unwrap().unwrap();
        assert_eq!(row.kind, ReactionKind::Dislike.as_i64());

        assert_eq!(db.toggle_like(&post, &account).unwrap(), ReactionState::Liked);
        let row = db.find_reaction(&post, &account).unwrap().unwrap();
        assert_eq!(row.kind, ReactionKind::Like.as_i64());
    }

    #[test]
    fn exactly_one_row_no_matter_how_many_toggles() {
        let db = db();
        let account = seed_account(&db, "bob");
        let post = seed_post(&db, &account);

        let first_id = {
            db.toggle_like(&post, &account).unwrap();
            db.find_reaction(&post, &account).unwrap().unwrap().id
        };

        for _ in 0..7 {
            db.toggle_like(&post, &account).unwrap();
        }

        assert_eq!(db.count_reaction_rows(&post, &account), 1);
        // Same row the whole time, mutated in place.
        assert_eq!(db.find_reaction(&post, &account).unwrap().unwrap().id, first_id);
    }

    #[test]
    fn two_toggles_round_trip_to_the_original_state() {
        let db = db();
        let account = seed_account(&db, "carol");
        let post = seed_post(&db, &account);

        db.toggle_like(&post, &account).unwrap();
        let before = db.find_reaction(&post, &account).unwrap().unwrap().kind;

        db.toggle_like(&post, &account).unwrap();
        db.toggle_like(&post, &account).unwrap();

        let after = db.find_reaction(&post, &account).unwrap().unwrap().kind;
        assert_eq!(before, after);
    }

    #[test]
    fn likes_count_only_like_kind() {
        let db = db();
        let author = seed_account(&db, "author");
        let post = seed_post(&db, &author);
        let fan = seed_account(&db, "fan");
        let critic = seed_account(&db, "critic");

        db.toggle_like(&post, &fan).unwrap();
        db.toggle_like(&post, &critic).unwrap();
        db.toggle_like(&post, &critic).unwrap(); // critic unlikes

        assert_eq!(db.count_likes(&post).unwrap(), 1);
    }

    #[test]
    fn toggling_a_missing_or_deleted_post_is_not_found() {
        let db = db();
        let account = seed_account(&db, "dora");

        let err = db.toggle_like("nope", &account).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("post")));

        let post = seed_post(&db, &account);
        db.soft_delete_post(&post).unwrap();
        let err = db.toggle_like(&post, &account).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("post")));

        let post2 = seed_post(&db, &account);
        let err = db.toggle_like(&post2, "ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound("account")));
    }
}
