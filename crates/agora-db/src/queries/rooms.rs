use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{MessageRow, RoomRow};
use crate::queries::require_account;
use crate::{Database, StoreError, StoreResult};

/// Sorted-id key for a two-party conversation, so the same two
/// accounts resolve to one room no matter who opened it.
fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Database {
    /// Resolve the unordered pair {a, b} to its single room, creating
    /// it on first contact. A concurrent first contact that loses the
    /// race to the UNIQUE(pair_lo, pair_hi) index is absorbed by
    /// re-reading the winner's row instead of surfacing the conflict.
    pub fn find_or_create_room(&self, account_a: &str, account_b: &str) -> StoreResult<RoomRow> {
        if account_a == account_b {
            return Err(StoreError::InvalidState(
                "a room needs two distinct accounts".into(),
            ));
        }

        self.with_conn_mut(|conn| {
            require_account(conn, account_a)?;
            require_account(conn, account_b)?;

            let (lo, hi) = canonical_pair(account_a, account_b);
            if let Some(room) = query_room_by_pair(conn, lo, hi)? {
                return Ok(room);
            }

            let insert = conn.execute(
                "INSERT INTO rooms (id, first_user, second_user, pair_lo, pair_hi)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Uuid::new_v4().to_string(), account_a, account_b, lo, hi],
            );
            match insert {
                Ok(_) => {}
                // Someone else just created it; fall through to re-read.
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
                Err(e) => return Err(e.into()),
            }

            query_room_by_pair(conn, lo, hi)?
                .ok_or_else(|| StoreError::Conflict("room pair".into()))
        })
    }

    pub fn get_room(&self, room_id: &str) -> StoreResult<Option<RoomRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{ROOM_SELECT} WHERE id = ?1"),
                    [room_id],
                    read_room,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Rooms the account participates in, most recent activity first.
    pub fn list_rooms_for(&self, account_id: &str) -> StoreResult<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ROOM_SELECT} WHERE first_user = ?1 OR second_user = ?1
                 ORDER BY COALESCE(last_message_at, created_at) DESC"
            ))?;
            let rows = stmt
                .query_map([account_id], read_room)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a message and bump the room's activity marker in one
    /// transaction; the unseen flag is set for the other side to clear.
    pub fn insert_message(
        &self,
        message_id: &str,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM rooms WHERE id = ?1", [room_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("room"));
            }

            tx.execute(
                "INSERT INTO messages (id, room_id, sender_id, content)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, room_id, sender_id, content],
            )?;
            tx.execute(
                "UPDATE rooms SET last_message_at = datetime('now'), seen = 0 WHERE id = ?1",
                [room_id],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_messages(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> StoreResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let rows = match before {
                Some(before) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, room_id, sender_id, content, created_at FROM messages
                         WHERE room_id = ?1 AND created_at < ?3
                         ORDER BY created_at DESC, id DESC LIMIT ?2",
                    )?;
                    stmt.query_map(params![room_id, limit, before], read_message)?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, room_id, sender_id, content, created_at FROM messages
                         WHERE room_id = ?1
                         ORDER BY created_at DESC, id DESC LIMIT ?2",
                    )?;
                    stmt.query_map(params![room_id, limit], read_message)?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })
    }

    pub fn mark_room_seen(&self, room_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE rooms SET seen = 1 WHERE id = ?1", [room_id])?;
            if changed == 0 {
                return Err(StoreError::NotFound("room"));
            }
            Ok(())
        })
    }
}

const ROOM_SELECT: &str =
    "SELECT id, first_user, second_user, last_message_at, seen FROM rooms";

fn read_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        first_user: row.get(1)?,
        second_user: row.get(2)?,
        last_message_at: row.get(3)?,
        seen: row.get(4)?,
    })
}

fn read_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_room_by_pair(conn: &Connection, lo: &str, hi: &str) -> StoreResult<Option<RoomRow>> {
    let row = conn
        .query_row(
            &format!("{ROOM_SELECT} WHERE pair_lo = ?1 AND pair_hi = ?2"),
            params![lo, hi],
            read_room,
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::StoreError;
    use crate::queries::test_support::{db, seed_account};

    #[test]
    fn pair_resolves_to_the_same_room_in_either_order() {
        let db = db();
        let a = seed_account(&db, "a");
        let b = seed_account(&db, "b");

        let first = db.find_or_create_room(&a, &b).unwrap();
        let second = db.find_or_create_room(&b, &a).unwrap();
        assert_eq!(first.id, second.id);

        let rooms_for_a = db.list_rooms_for(&a).unwrap();
        assert_eq!(rooms_for_a.len(), 1);
    }

    #[test]
    fn distinct_pairs_get_distinct_rooms() {
        let db = db();
        let a = seed_account(&db, "a");
        let b = seed_account(&db, "b");
        let c = seed_account(&db, "c");

        let ab = db.find_or_create_room(&a, &b).unwrap();
        let ac = db.find_or_create_room(&c, &a).unwrap();
        assert_ne!(ab.id, ac.id);

        assert_eq!(db.list_rooms_for(&a).unwrap().len(), 2);
        assert_eq!(db.list_rooms_for(&b).unwrap().len(), 1);
    }

    #[test]
    fn self_room_is_rejected() {
        let db = db();
        let a = seed_account(&db, "loner");
        let err = db.find_or_create_room(&a, &a).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
    }

    #[test]
    fn lost_insert_race_falls_back_to_the_existing_row() {
        let db = db();
        let a = seed_account(&db, "a");
        let b = seed_account(&db, "b");

        // Plant the winner's row directly under the canonical key but
        // with the arguments reversed relative to the later call.
        let existing = db.find_or_create_room(&b, &a).unwrap();
        let resolved = db.find_or_create_room(&a, &b).unwrap();
        assert_eq!(existing.id, resolved.id);
    }

    #[test]
    fn sending_updates_activity_and_clears_seen() {
        let db = db();
        let a = seed_account(&db, "a");
        let b = seed_account(&db, "b");
        let room = db.find_or_create_room(&a, &b).unwrap();
        assert!(room.last_message_at.is_none());

        db.mark_room_seen(&room.id).unwrap();
        db.insert_message(&Uuid::new_v4().to_string(), &room.id, &a, "hey")
            .unwrap();

        let room = db.get_room(&room.id).unwrap().unwrap();
        assert!(room.last_message_at.is_some());
        assert!(!room.seen);

        let messages = db.list_messages(&room.id, 50, None).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hey");
        assert_eq!(messages[0].sender_id, a);
    }

    #[test]
    fn message_to_missing_room_is_not_found() {
        let db = db();
        let a = seed_account(&db, "a");
        let err = db
            .insert_message("m1", "no-room", &a, "hello?")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("room")));
    }
}
