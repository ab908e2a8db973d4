use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use agora_types::models::VoteOutcome;

use crate::models::{PollOptionRow, PollResponseRow, PollRow};
use crate::queries::{require_account, require_active_post, unique_to_conflict};
use crate::{Database, StoreError, StoreResult};

impl Database {
    /// Create a poll with its initial options. The UNIQUE(post_id)
    /// constraint enforces the 1:1 relation to the post.
    pub fn create_poll(
        &self,
        poll_id: &str,
        post_id: &str,
        title: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        options: &[String],
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_active_post(&tx, post_id)?;

            tx.execute(
                "INSERT INTO polls (id, post_id, title, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    poll_id,
                    post_id,
                    title,
                    start_time.to_rfc3339(),
                    end_time.to_rfc3339()
                ],
            )
            .map_err(|e| unique_to_conflict(e, "post already has a poll"))?;

            for text in options {
                tx.execute(
                    "INSERT INTO poll_options (id, poll_id, option_text) VALUES (?1, ?2, ?3)",
                    params![Uuid::new_v4().to_string(), poll_id, text],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn add_poll_option(&self, option_id: &str, poll_id: &str, text: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM polls WHERE id = ?1", [poll_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound("poll"));
            }
            conn.execute(
                "INSERT INTO poll_options (id, poll_id, option_text) VALUES (?1, ?2, ?3)",
                params![option_id, poll_id, text],
            )?;
            Ok(())
        })
    }

    pub fn get_poll(&self, poll_id: &str) -> StoreResult<Option<PollRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, post_id, title, start_time, end_time, is_closed
                     FROM polls WHERE id = ?1",
                    [poll_id],
                    read_poll,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_poll_by_post(&self, post_id: &str) -> StoreResult<Option<PollRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, post_id, title, start_time, end_time, is_closed
                     FROM polls WHERE post_id = ?1",
                    [post_id],
                    read_poll,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_poll_options(&self, poll_id: &str) -> StoreResult<Vec<PollOptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, poll_id, option_text, vote_count
                 FROM poll_options WHERE poll_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([poll_id], |row| {
                    Ok(PollOptionRow {
                        id: row.get(0)?,
                        poll_id: row.get(1)?,
                        option_text: row.get(2)?,
                        vote_count: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The voting engine. One response row per (poll, account); a
    /// repeat vote repoints the row and moves the cached counts, all
    /// inside one transaction so the counts can never drift from the
    /// response rows. Voting is gated on BOTH the closed flag and the
    /// [start, end] window — closing is not purely time-derived.
    pub fn cast_vote(
        &self,
        poll_id: &str,
        account_id: &str,
        option_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<VoteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let poll: Option<(bool, String, String)> = tx
                .query_row(
                    "SELECT is_closed, start_time, end_time FROM polls WHERE id = ?1",
                    [poll_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (is_closed, start, end) = poll.ok_or(StoreError::NotFound("poll"))?;
            require_account(&tx, account_id)?;

            if is_closed {
                return Err(StoreError::InvalidState("poll is closed".into()));
            }
            let start = parse_poll_time(&start)?;
            let end = parse_poll_time(&end)?;
            if now < start || now > end {
                return Err(StoreError::InvalidState(
                    "poll voting window is not open".into(),
                ));
            }

            let option_poll: Option<String> = tx
                .query_row(
                    "SELECT poll_id FROM poll_options WHERE id = ?1",
                    [option_id],
                    |row| row.get(0),
                )
                .optional()?;
            match option_poll.as_deref() {
                None => return Err(StoreError::NotFound("poll option")),
                Some(p) if p != poll_id => {
                    return Err(StoreError::InvalidState(
                        "option does not belong to this poll".into(),
                    ));
                }
                Some(_) => {}
            }

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, option_id FROM poll_responses
                     WHERE poll_id = ?1 AND account_id = ?2",
                    params![poll_id, account_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO poll_responses (id, poll_id, option_id, account_id)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![Uuid::new_v4().to_string(), poll_id, option_id, account_id],
                    )?;
                    tx.execute(
                        "UPDATE poll_options SET vote_count = vote_count + 1 WHERE id = ?1",
                        [option_id],
                    )?;
                    VoteOutcome::Recorded
                }
                Some((_, ref prev)) if prev.as_str() == option_id => VoteOutcome::Unchanged,
                Some((response_id, prev)) => {
                    tx.execute(
                        "UPDATE poll_options SET vote_count = vote_count - 1 WHERE id = ?1",
                        [prev],
                    )?;
                    tx.execute(
                        "UPDATE poll_responses SET option_id = ?2 WHERE id = ?1",
                        params![response_id, option_id],
                    )?;
                    tx.execute(
                        "UPDATE poll_options SET vote_count = vote_count + 1 WHERE id = ?1",
                        [option_id],
                    )?;
                    VoteOutcome::Changed
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// One-way transition; closing an already-closed poll is a no-op.
    pub fn close_poll(&self, poll_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE polls SET is_closed = 1 WHERE id = ?1",
                [poll_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("poll"));
            }
            Ok(())
        })
    }

    pub fn find_poll_response(
        &self,
        poll_id: &str,
        account_id: &str,
    ) -> StoreResult<Option<PollResponseRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, poll_id, option_id, account_id FROM poll_responses
                     WHERE poll_id = ?1 AND account_id = ?2",
                    params![poll_id, account_id],
                    |row| {
                        Ok(PollResponseRow {
                            id: row.get(0)?,
                            poll_id: row.get(1)?,
                            option_id: row.get(2)?,
                            account_id: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn read_poll(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollRow> {
    Ok(PollRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        title: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        is_closed: row.get(5)?,
    })
}

fn parse_poll_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidState(format!("unparseable poll time: {raw}")))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use agora_types::models::VoteOutcome;

    use crate::{Database, StoreError};
    use crate::queries::test_support::{db, seed_account, seed_post};

    fn seed_poll(db: &Database, options: &[&str]) -> (String, Vec<String>) {
        let owner = seed_account(db, &format!("owner-{}", Uuid::new_v4()));
        let post = seed_post(db, &owner);
        let poll_id = Uuid::new_v4().to_string();
        let texts: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        db.create_poll(
            &poll_id,
            &post,
            "favorite?",
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(1),
            &texts,
        )
        .unwrap();
        let ids = db
            .list_poll_options(&poll_id)
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        (poll_id, ids)
    }

    fn counts(db: &Database, poll_id: &str) -> Vec<i64> {
        db.list_poll_options(poll_id)
            .unwrap()
            .into_iter()
            .map(|o| o.vote_count)
            .collect()
    }

    #[test]
    fn vote_move_and_idempotent_revote() {
        let db = db();
        let (poll, opts) = seed_poll(&db, &["red", "blue"]);
        let voter = seed_account(&db, "voter");

        assert_eq!(
            db.cast_vote(&poll, &voter, &opts[0], Utc::now()).unwrap(),
            VoteOutcome::Recorded
        );
        assert_eq!(counts(&db, &poll), vec![1, 0]);

        assert_eq!(
            db.cast_vote(&poll, &voter, &opts[1], Utc::now()).unwrap(),
            VoteOutcome::Changed
        );
        assert_eq!(counts(&db, &poll), vec![0, 1]);

        assert_eq!(
            db.cast_vote(&poll, &voter, &opts[1], Utc::now()).unwrap(),
            VoteOutcome::Unchanged
        );
        assert_eq!(counts(&db, &poll), vec![0, 1]);

        // Still a single response row, pointing at the final option.
        let response = db.find_poll_response(&poll, &voter).unwrap().unwrap();
        assert_eq!(response.option_id, opts[1]);
    }

    #[test]
    fn counts_match_response_rows_across_accounts() {
        let db = db();
        let (poll, opts) = seed_poll(&db, &["a", "b", "c"]);

        let voters: Vec<String> = (0..5)
            .map(|i| seed_account(&db, &format!("v{i}")))
            .collect();

        db.cast_vote(&poll, &voters[0], &opts[0], Utc::now()).unwrap();
        db.cast_vote(&poll, &voters[1], &opts[0], Utc::now()).unwrap();
        db.cast_vote(&poll, &voters[2], &opts[1], Utc::now()).unwrap();
        db.cast_vote(&poll, &voters[3], &opts[2], Utc::now()).unwrap();
        db.cast_vote(&poll, &voters[4], &opts[2], Utc::now()).unwrap();
        // Some churn.
        db.cast_vote(&poll, &voters[1], &opts[1], Utc::now()).unwrap();
        db.cast_vote(&poll, &voters[4], &opts[2], Utc::now()).unwrap();

        let totals = counts(&db, &poll);
        assert_eq!(totals.iter().sum::<i64>(), 5);
        assert_eq!(totals, vec![1, 2, 2]);

        // Each option's cached count equals the rows pointing at it.
        for (i, option_id) in opts.iter().enumerate() {
            let rows: i64 = db
                .with_conn(|conn| {
                    Ok(conn.query_row(
                        "SELECT COUNT(*) FROM poll_responses WHERE option_id = ?1",
                        [option_id.as_str()],
                        |row| row.get(0),
                    )?)
                })
                .unwrap();
            assert_eq!(rows, totals[i]);
        }
    }

    #[test]
    fn closed_poll_rejects_votes_and_leaves_counts_alone() {
        let db = db();
        let (poll, opts) = seed_poll(&db, &["yes", "no"]);
        let voter = seed_account(&db, "late-voter");
        let early = seed_account(&db, "early-voter");

        db.cast_vote(&poll, &early, &opts[0], Utc::now()).unwrap();
        db.close_poll(&poll).unwrap();
        // Closing twice changes nothing.
        db.close_poll(&poll).unwrap();
        assert!(db.get_poll(&poll).unwrap().unwrap().is_closed);

        let err = db.cast_vote(&poll, &voter, &opts[1], Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
        assert_eq!(counts(&db, &poll), vec![1, 0]);
        assert!(db.find_poll_response(&poll, &voter).unwrap().is_none());
    }

    #[test]
    fn voting_outside_the_window_is_invalid_state() {
        let db = db();
        let (poll, opts) = seed_poll(&db, &["x"]);
        let voter = seed_account(&db, "time-traveler");

        let too_late = Utc::now() + Duration::hours(2);
        let err = db.cast_vote(&poll, &voter, &opts[0], too_late).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));

        let too_early = Utc::now() - Duration::hours(2);
        let err = db.cast_vote(&poll, &voter, &opts[0], too_early).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
    }

    #[test]
    fn option_must_belong_to_the_poll() {
        let db = db();
        let (poll_a, _opts_a) = seed_poll(&db, &["a1"]);
        let (_poll_b, opts_b) = seed_poll(&db, &["b1"]);
        let voter = seed_account(&db, "confused");

        let err = db
            .cast_vote(&poll_a, &voter, &opts_b[0], Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));

        let err = db
            .cast_vote(&poll_a, &voter, "no-such-option", Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("poll option")));
    }

    #[test]
    fn second_poll_on_a_post_is_a_conflict() {
        let db = db();
        let owner = seed_account(&db, "pollster");
        let post = seed_post(&db, &owner);

        let window = (Utc::now(), Utc::now() + Duration::hours(1));
        db.create_poll("poll-1", &post, "first", window.0, window.1, &[])
            .unwrap();
        let err = db
            .create_poll("poll-2", &post, "second", window.0, window.1, &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
