use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{CategoryRow, PostRow, ProductRow};
use crate::queries::{require_account, require_active_post};
use crate::{Database, StoreError, StoreResult};

/// Product details captured when a marketplace post is created. The
/// category is matched by name and created on first use.
#[derive(Debug)]
pub struct NewProductInsert<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub category: &'a str,
}

impl Database {
    /// Create a post; when `product` is present the product (and its
    /// category, if new) are written in the same transaction.
    pub fn create_post(
        &self,
        post_id: &str,
        account_id: &str,
        content: &str,
        image_url: Option<&str>,
        product: Option<NewProductInsert<'_>>,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_account(&tx, account_id)?;

            let product_id = match product {
                Some(p) => {
                    let category_id = find_or_create_category(&tx, p.category)?;
                    let product_id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO products (id, name, description, price, category_id, owner_id)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![product_id, p.name, p.description, p.price, category_id, account_id],
                    )?;
                    Some(product_id)
                }
                None => None,
            };

            tx.execute(
                "INSERT INTO posts (id, account_id, content, image_url, product_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![post_id, account_id, content, image_url, product_id],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, post_id: &str) -> StoreResult<Option<PostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{POST_SELECT} WHERE id = ?1"),
                    [post_id],
                    read_post,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_product(&self, product_id: &str) -> StoreResult<Option<ProductRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT p.id, p.name, p.description, p.price, p.category_id, c.name
                     FROM products p JOIN categories c ON p.category_id = c.id
                     WHERE p.id = ?1",
                    [product_id],
                    |row| {
                        Ok(ProductRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            price: row.get(3)?,
                            category_id: row.get(4)?,
                            category_name: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Newest-first feed of active posts; `before` is the created_at
    /// cursor of the oldest post from the previous page.
    pub fn list_feed(&self, limit: u32, before: Option<&str>) -> StoreResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let rows = match before {
                Some(before) => {
                    let mut stmt = conn.prepare(&format!(
                        "{POST_SELECT} WHERE active = 1 AND created_at < ?2
                         ORDER BY created_at DESC, id DESC LIMIT ?1"
                    ))?;
                    stmt.query_map(params![limit, before], read_post)?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "{POST_SELECT} WHERE active = 1
                         ORDER BY created_at DESC, id DESC LIMIT ?1"
                    ))?;
                    stmt.query_map([limit], read_post)?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })
    }

    pub fn list_posts_by_account(
        &self,
        account_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT} WHERE active = 1 AND account_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![account_id, limit], read_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_posts_by_category(&self, category_id: &str) -> StoreResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT po.id, po.account_id, po.content, po.image_url, po.product_id,
                        po.active, po.created_at
                 FROM posts po JOIN products pr ON po.product_id = pr.id
                 WHERE po.active = 1 AND pr.category_id = ?1
                 ORDER BY po.created_at DESC, po.id DESC",
            )?;
            let rows = stmt
                .query_map([category_id], read_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_categories(&self) -> StoreResult<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_post(
        &self,
        post_id: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET content = ?2, image_url = ?3 WHERE id = ?1 AND active = 1",
                params![post_id, content, image_url],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("post"));
            }
            Ok(())
        })
    }

    /// Soft delete: the row stays, reactions and comments stay with it.
    pub fn soft_delete_post(&self, post_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET active = 0 WHERE id = ?1 AND active = 1",
                [post_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("post"));
            }
            Ok(())
        })
    }

    /// Batch like counts for a page of posts, one query for the page.
    pub fn like_counts_for_posts(&self, post_ids: &[String]) -> StoreResult<Vec<(String, i64)>> {
        self.counts_for_posts(
            post_ids,
            "SELECT post_id, COUNT(*) FROM reactions WHERE kind = 1 AND post_id IN ({}) GROUP BY post_id",
        )
    }

    pub fn comment_counts_for_posts(
        &self,
        post_ids: &[String],
    ) -> StoreResult<Vec<(String, i64)>> {
        self.counts_for_posts(
            post_ids,
            "SELECT post_id, COUNT(*) FROM comments WHERE active = 1 AND post_id IN ({}) GROUP BY post_id",
        )
    }

    fn counts_for_posts(
        &self,
        post_ids: &[String],
        sql_template: &str,
    ) -> StoreResult<Vec<(String, i64)>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = sql_template.replace("{}", &placeholders.join(", "));

            let mut stmt = conn.prepare(&sql)?;
            let sql_params: Vec<&dyn rusqlite::types::ToSql> = post_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(sql_params.as_slice(), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts-per-month rollup; optional filter to a single month.
    pub fn monthly_post_counts(
        &self,
        month: Option<u32>,
        year: Option<i32>,
    ) -> StoreResult<Vec<(u32, i32, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT CAST(strftime('%m', created_at) AS INTEGER) AS m,
                        CAST(strftime('%Y', created_at) AS INTEGER) AS y,
                        COUNT(*)
                 FROM posts
                 WHERE active = 1
                   AND (?1 IS NULL OR CAST(strftime('%m', created_at) AS INTEGER) = ?1)
                   AND (?2 IS NULL OR CAST(strftime('%Y', created_at) AS INTEGER) = ?2)
                 GROUP BY m, y
                 ORDER BY y, m",
            )?;
            let rows = stmt
                .query_map(params![month, year], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Post existence check used by handlers that need the owner for a
    /// policy decision before mutating.
    pub fn require_post_owner(&self, post_id: &str) -> StoreResult<String> {
        self.with_conn(|conn| require_active_post(conn, post_id))
    }
}

const POST_SELECT: &str =
    "SELECT id, account_id, content, image_url, product_id, active, created_at FROM posts";

fn read_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        content: row.get(2)?,
        image_url: row.get(3)?,
        product_id: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn find_or_create_category(conn: &Connection, name: &str) -> StoreResult<String> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM categories WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()?;

    match existing {
        Some(id) => Ok(id),
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO categories (id, name) VALUES (?1, ?2)",
                params![id, name],
            )?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::NewProductInsert;
    use crate::StoreError;
    use crate::queries::test_support::{db, seed_account, seed_post};

    #[test]
    fn product_post_creates_category_once() {
        let db = db();
        let account = seed_account(&db, "seller");

        for name in ["bike", "helmet"] {
            let post_id = Uuid::new_v4().to_string();
            db.create_post(
                &post_id,
                &account,
                "for sale",
                None,
                Some(NewProductInsert {
                    name,
                    description: "lightly used",
                    price: 25.0,
                    category: "sports",
                }),
            )
            .unwrap();
        }

        let categories = db.list_categories().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "sports");

        let posts = db.list_posts_by_category(&categories[0].id).unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn soft_delete_hides_post_from_feed() {
        let db = db();
        let account = seed_account(&db, "poster");
        let post_id = seed_post(&db, &account);

        assert_eq!(db.list_feed(50, None).unwrap().len(), 1);

        db.soft_delete_post(&post_id).unwrap();
        assert!(db.list_feed(50, None).unwrap().is_empty());

        // Row survives, just inactive.
        let row = db.get_post(&post_id).unwrap().unwrap();
        assert!(!row.active);

        // Deleting twice is a NotFound, not a second write.
        let err = db.soft_delete_post(&post_id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("post")));
    }

    #[test]
    fn create_post_requires_existing_account() {
        let db = db();
        let err = db
            .create_post("p1", "no-such-account", "hi", None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("account")));
    }
}
