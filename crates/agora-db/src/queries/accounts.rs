use rusqlite::{OptionalExtension, params};

use agora_types::models::Role;

use crate::models::AccountRow;
use crate::queries::unique_to_conflict;
use crate::{Database, StoreResult};

impl Database {
    /// Create the credential row and its 1:1 profile as one unit.
    #[allow(clippy::too_many_arguments)]
    pub fn create_account(
        &self,
        user_id: &str,
        username: &str,
        password_hash: &str,
        account_id: &str,
        phone_number: Option<&str>,
        date_of_birth: Option<&str>,
        gender: Option<bool>,
        role: Role,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                params![user_id, username, password_hash],
            )
            .map_err(|e| unique_to_conflict(e, "username already taken"))?;

            tx.execute(
                "INSERT INTO accounts (id, user_id, phone_number, date_of_birth, gender, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    account_id,
                    user_id,
                    phone_number,
                    date_of_birth,
                    gender,
                    role.as_str()
                ],
            )
            .map_err(|e| unique_to_conflict(e, "phone number already registered"))?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Login lookup: profile row plus the stored password hash.
    pub fn get_account_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<(AccountRow, String)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{ACCOUNT_SELECT} WHERE u.username = ?1"),
                    [username],
                    |row| Ok((read_account(row)?, row.get::<_, String>(8)?)),
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_account(&self, account_id: &str) -> StoreResult<Option<AccountRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{ACCOUNT_SELECT} WHERE a.id = ?1"),
                    [account_id],
                    |row| read_account(row),
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_accounts(&self, limit: u32) -> StoreResult<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ACCOUNT_SELECT} WHERE a.active = 1 ORDER BY u.username LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], |row| read_account(row))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial profile update; absent fields keep their current value.
    pub fn update_account(
        &self,
        account_id: &str,
        phone_number: Option<&str>,
        date_of_birth: Option<&str>,
        gender: Option<bool>,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE accounts SET
                     phone_number  = COALESCE(?2, phone_number),
                     date_of_birth = COALESCE(?3, date_of_birth),
                     gender        = COALESCE(?4, gender)
                 WHERE id = ?1",
                params![account_id, phone_number, date_of_birth, gender],
            )
            .map_err(|e| unique_to_conflict(e, "phone number already registered"))?;
            Ok(())
        })
    }
}

const ACCOUNT_SELECT: &str = "SELECT a.id, a.user_id, u.username, a.phone_number, \
     a.date_of_birth, a.gender, a.role, a.active, u.password \
     FROM accounts a JOIN users u ON a.user_id = u.id";

fn read_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        phone_number: row.get(3)?,
        date_of_birth: row.get(4)?,
        gender: row.get(5)?,
        role: row.get(6)?,
        active: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::queries::test_support::{db, seed_account};

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = db();
        seed_account(&db, "alice");

        let err = db
            .create_account(
                "u2",
                "alice",
                "hash",
                "a2",
                None,
                None,
                None,
                agora_types::models::Role::User,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The failed transaction must not leave an orphan user row.
        assert!(db.get_account_by_username("alice").unwrap().is_some());
        assert!(db.get_account("a2").unwrap().is_none());
    }

    #[test]
    fn update_keeps_absent_fields() {
        let db = db();
        let id = seed_account(&db, "bob");

        db.update_account(&id, Some("555-0101"), None, Some(true))
            .unwrap();
        db.update_account(&id, None, Some("1990-01-01"), None)
            .unwrap();

        let account = db.get_account(&id).unwrap().unwrap();
        assert_eq!(account.phone_number.as_deref(), Some("555-0101"));
        assert_eq!(account.date_of_birth.as_deref(), Some("1990-01-01"));
        assert_eq!(account.gender, Some(true));
    }

    #[test]
    fn duplicate_phone_is_a_conflict() {
        let db = db();
        let a = seed_account(&db, "carol");
        let b = seed_account(&db, "dave");

        db.update_account(&a, Some("555-0199"), None, None).unwrap();
        let err = db
            .update_account(&b, Some("555-0199"), None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
