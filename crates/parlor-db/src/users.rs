use anyhow::anyhow;
use parlor_types::validate::{validate_photo, validate_username};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::DbResultExt;
use crate::models::UserRow;
use crate::{Database, DbError, DbResult, new_id, now_timestamp};

const SEARCH_LIMIT: u32 = 50;

impl Database {
    pub fn create_user(&self, username: &str, photo: Option<&[u8]>) -> DbResult<UserRow> {
        validate_username(username)?;
        if let Some(photo) = photo {
            validate_photo(photo)?;
        }

        let user = UserRow {
            id: new_id(),
            username: username.to_string(),
            photo: photo.map(<[u8]>::to_vec),
            created_at: now_timestamp(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, photo, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.username, user.photo, user.created_at],
            )?;
            Ok(())
        })
        .on_conflict(|| format!("username '{}' is taken", username))
        .op("create user")?;

        info!(user_id = %user.id, username, "User created");
        Ok(user)
    }

    /// Returns the user called `username`, creating it on first sight.
    /// The flag is `true` when this call created the user.
    pub fn login(&self, username: &str) -> DbResult<(UserRow, bool)> {
        validate_username(username)?;

        let (user, created) = self
            .with_conn(|conn| {
                let inserted = conn.execute(
                    "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(username) DO NOTHING",
                    params![new_id(), username, now_timestamp()],
                )?;
                let user = query_user_by_name(conn, username)?
                    .ok_or_else(|| anyhow!("user '{}' missing right after upsert", username))?;
                Ok((user, inserted == 1))
            })
            .op("login")?;

        if created {
            info!(user_id = %user.id, username, "User created on first login");
        }
        Ok((user, created))
    }

    pub fn get_user_by_name(&self, username: &str) -> DbResult<UserRow> {
        self.with_conn(|conn| query_user_by_name(conn, username))
            .op("get user by name")?
            .ok_or_else(|| DbError::not_found(format!("user '{}'", username)))
    }

    pub fn get_user_by_id(&self, id: &str) -> DbResult<UserRow> {
        self.with_conn(|conn| query_user_by_id(conn, id))
            .op("get user by id")?
            .ok_or_else(|| DbError::not_found("user"))
    }

    /// Case-insensitive substring match on usernames.
    pub fn search_users(&self, query: &str) -> DbResult<Vec<UserRow>> {
        let pattern = format!("%{}%", escape_like(query));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, photo, created_at FROM users
                 WHERE username LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, SEARCH_LIMIT], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .op("search users")
    }

    /// Renames a user. Reactions carry a copy of the username for display,
    /// so those copies are rewritten in the same transaction.
    pub fn update_username(&self, id: &str, new_username: &str) -> DbResult<()> {
        validate_username(new_username)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                params![new_username, id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("user"));
            }
            tx.execute(
                "UPDATE reactions SET username = ?1 WHERE user_id = ?2",
                params![new_username, id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .on_conflict(|| format!("username '{}' is taken", new_username))
        .op("update username")?;

        info!(user_id = id, username = new_username, "Username updated");
        Ok(())
    }

    pub fn update_user_photo(&self, id: &str, photo: &[u8]) -> DbResult<()> {
        validate_photo(photo)?;

        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET photo = ?1 WHERE id = ?2", params![photo, id])?;
            if changed == 0 {
                return Err(DbError::not_found("user"));
            }
            Ok(())
        })
        .op("update user photo")
    }
}

pub(crate) fn user_exists(conn: &Connection, id: &str) -> DbResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        photo: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_user_by_name(conn: &Connection, username: &str) -> DbResult<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, photo, created_at FROM users WHERE username = ?1",
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> DbResult<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, photo, created_at FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
