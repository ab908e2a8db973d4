use rusqlite::{OptionalExtension, params};

use crate::models::CommentRow;
use crate::queries::{require_account, require_active_post};
use crate::{Database, StoreError, StoreResult};

impl Database {
    pub fn insert_comment(
        &self,
        comment_id: &str,
        post_id: &str,
        account_id: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            require_active_post(conn, post_id)?;
            require_account(conn, account_id)?;

            conn.execute(
                "INSERT INTO comments (id, post_id, account_id, content, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![comment_id, post_id, account_id, content, image_url],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, comment_id: &str) -> StoreResult<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{COMMENT_SELECT} WHERE id = ?1"),
                    [comment_id],
                    read_comment,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_comments(&self, post_id: &str) -> StoreResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE post_id = ?1 AND active = 1
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map([post_id], read_comment)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(
        &self,
        comment_id: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET content = ?2, image_url = ?3 WHERE id = ?1 AND active = 1",
                params![comment_id, content, image_url],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("comment"));
            }
            Ok(())
        })
    }

    pub fn soft_delete_comment(&self, comment_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET active = 0 WHERE id = ?1 AND active = 1",
                [comment_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("comment"));
            }
            Ok(())
        })
    }
}

const COMMENT_SELECT: &str =
    "SELECT id, post_id, account_id, content, image_url, active, created_at FROM comments";

fn read_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        account_id: row.get(2)?,
        content: row.get(3)?,
        image_url: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::queries::test_support::{db, seed_account, seed_post};

    #[test]
    fn comment_lifecycle() {
        let db = db();
        let author = seed_account(&db, "author");
        let post = seed_post(&db, &author);

        db.insert_comment("c1", &post, &author, "nice", None).unwrap();
        db.update_comment("c1", "very nice", None).unwrap();

        let comments = db.list_comments(&post).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "very nice");

        db.soft_delete_comment("c1").unwrap();
        assert!(db.list_comments(&post).unwrap().is_empty());
        // Soft: the row is still fetchable by id.
        assert!(db.get_comment("c1").unwrap().is_some());
    }

    #[test]
    fn commenting_on_inactive_post_is_not_found() {
        let db = db();
        let author = seed_account(&db, "author");
        let post = seed_post(&db, &author);
        db.soft_delete_post(&post).unwrap();

        let err = db
            .insert_comment("c1", &post, &author, "too late", None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("post")));
    }
}
