use parlor_types::validate::validate_emoji;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::info;

use crate::error::DbResultExt;
use crate::models::ReactionRow;
use crate::{Database, DbError, DbResult, ID_CHUNK, now_timestamp, placeholders};

impl Database {
    /// Sets `user_id`'s reaction on a message, replacing any earlier one.
    pub fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        username: &str,
    ) -> DbResult<ReactionRow> {
        validate_emoji(emoji)?;

        let reaction = ReactionRow {
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            emoji: emoji.to_string(),
            created_at: now_timestamp(),
        };

        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM messages WHERE id = ?1", [message_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(DbError::not_found("message"));
            }

            conn.execute(
                "INSERT INTO reactions (message_id, user_id, username, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(message_id, user_id) DO UPDATE SET
                     emoji = excluded.emoji,
                     username = excluded.username,
                     created_at = excluded.created_at",
                params![
                    reaction.message_id,
                    reaction.user_id,
                    reaction.username,
                    reaction.emoji,
                    reaction.created_at,
                ],
            )?;
            Ok(())
        })
        .op("add reaction")?;

        info!(message_id, user_id, emoji, "Reaction set");
        Ok(reaction)
    }

    /// Returns whether a reaction was removed. Removing nothing is not an error.
    pub fn remove_reaction(&self, message_id: &str, user_id: &str) -> DbResult<bool> {
        let removed = self
            .with_conn(|conn| {
                let n = conn.execute(
                    "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
                    params![message_id, user_id],
                )?;
                Ok(n > 0)
            })
            .op("remove reaction")?;

        if removed {
            info!(message_id, user_id, "Reaction removed");
        }
        Ok(removed)
    }

    pub fn get_reactions(&self, message_ids: &[String]) -> DbResult<Vec<ReactionRow>> {
        self.with_conn(|conn| query_reactions(conn, message_ids))
            .op("get reactions")
    }
}

pub(crate) fn query_reactions(conn: &Connection, message_ids: &[String]) -> DbResult<Vec<ReactionRow>> {
    let mut reactions = Vec::new();
    for chunk in message_ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT message_id, user_id, username, emoji, created_at
             FROM reactions
             WHERE message_id IN ({})
             ORDER BY created_at, user_id",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                emoji: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        for row in rows {
            reactions.push(row?);
        }
    }
    Ok(reactions)
}
