use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

use super::Database;
use crate::error::StoreResult;
use crate::models::{NewUser, User, now_timestamp};

const USER_COLUMNS: &str = "id, username, password_hash, email, created_at, last_login";

impl Database {
    /// Insert a user whose password is already hashed.
    pub fn insert_user(&self, user: &NewUser) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO users (username, password_hash, email, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user.username, user.password_hash, user.email, user.created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Register a new account, hashing the password with bcrypt.
    pub fn create_user(&self, username: &str, password: &str, email: Option<&str>) -> StoreResult<User> {
        let password_hash = bcrypt::hash(password, self.password_cost)?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            email: email.map(str::to_string),
            created_at: now_timestamp(),
        };
        let id = self.insert_user(&new_user)?;
        info!(id, username, "created user");

        Ok(User {
            id,
            username: new_user.username,
            password_hash: new_user.password_hash,
            email: new_user.email,
            created_at: new_user.created_at,
            last_login: None,
        })
    }

    /// Check a password. On success `last_login` is stamped and the refreshed user returned.
    pub fn authenticate_user(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(mut user) = self.get_user_by_username(username)? else {
            debug!(username, "login for unknown user");
            return Ok(None);
        };

        // Hashes not produced by bcrypt (including legacy pbkdf2 `salt:hash`) never verify.
        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            debug!(username, "password mismatch");
            return Ok(None);
        }

        let now = now_timestamp();
        self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now, user.id],
        )?;
        user.last_login = Some(now);
        info!(id = user.id, username, "user logged in");
        Ok(Some(user))
    }

    pub fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                [username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS))?;
        let rows = stmt.query_map([], Self::row_to_user)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn user_exists(&self) -> StoreResult<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            email: row.get(3)?,
            created_at: row.get(4)?,
            last_login: row.get(5)?,
        })
    }
}
