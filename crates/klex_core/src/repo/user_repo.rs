//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `email` renames repoint owned media files inside the same transaction.
//! - Deleting a user who still owns files is left to the deferred foreign
//!   key check: the caller's commit fails and must be rolled back.

use crate::model::User;
use crate::repo::{get_u32, RepoResult};
use crate::session::ConnectionSession;
use log::{debug, warn};
use rusqlite::{params, Row};

const USER_SELECT_SQL: &str = "SELECT
    email,
    first_name,
    last_name,
    age,
    access_code,
    preferred_language
FROM User";

/// Repository interface for catalog users.
pub trait UserRepository {
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn get_user(&self, email: &str) -> RepoResult<Option<User>>;
    fn add_user(&self, user: &User) -> RepoResult<()>;
    /// Updates the row keyed by `previous_email`; returns matched rows.
    fn update_user(&self, previous_email: &str, user: &User) -> RepoResult<usize>;
    fn delete_user(&self, email: &str) -> RepoResult<usize>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteUserRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn list_users(&self) -> RepoResult<Vec<User>> {
        self.session.query(
            &format!("{USER_SELECT_SQL} ORDER BY email ASC;"),
            [],
            parse_user_row,
        )
    }

    fn get_user(&self, email: &str) -> RepoResult<Option<User>> {
        self.session.query_optional(
            &format!("{USER_SELECT_SQL} WHERE email = ?1;"),
            [email],
            parse_user_row,
        )
    }

    fn add_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        self.session.execute(
            "INSERT INTO User (
                email,
                first_name,
                last_name,
                age,
                access_code,
                preferred_language
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                user.email,
                user.first_name,
                user.last_name,
                user.age,
                user.access_code,
                user.preferred_language,
            ],
        )?;
        debug!("event=user_add module=repo status=ok");
        Ok(())
    }

    fn update_user(&self, previous_email: &str, user: &User) -> RepoResult<usize> {
        user.validate()?;
        let changed = self.session.execute(
            "UPDATE User
             SET
                email = ?1,
                first_name = ?2,
                last_name = ?3,
                age = ?4,
                access_code = ?5,
                preferred_language = ?6
             WHERE email = ?7;",
            params![
                user.email,
                user.first_name,
                user.last_name,
                user.age,
                user.access_code,
                user.preferred_language,
                previous_email,
            ],
        )?;

        if changed == 0 {
            warn!("event=user_update module=repo status=stale_key matched=0");
            return Ok(0);
        }

        if previous_email != user.email {
            self.session.execute(
                "UPDATE MediaFile SET user_email = ?1 WHERE user_email = ?2;",
                params![user.email, previous_email],
            )?;
        }
        Ok(changed)
    }

    fn delete_user(&self, email: &str) -> RepoResult<usize> {
        let changed = self
            .session
            .execute("DELETE FROM User WHERE email = ?1;", [email])?;
        Ok(changed)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        age: get_u32(row, "age")?,
        access_code: row.get("access_code")?,
        preferred_language: row.get("preferred_language")?,
    })
}
