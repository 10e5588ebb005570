use std::collections::HashMap;

use parlor_types::models::ReceiptStatus;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::error::DbResultExt;
use crate::models::ReceiptRow;
use crate::{Database, DbError, DbResult, ID_CHUNK, now_timestamp, parse_column, placeholders};

/// Receipts of a batch of messages, keyed by message id.
pub(crate) type ReceiptsByMessage = HashMap<String, Vec<(String, ReceiptStatus)>>;

impl Database {
    /// Records `user_id`'s receipt for a message. A `read` receipt is never
    /// downgraded back to `delivered`.
    pub fn mark_status(
        &self,
        message_id: &str,
        user_id: &str,
        status: ReceiptStatus,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            let exists = conn
                .query_row("SELECT 1 FROM messages WHERE id = ?1", [message_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(DbError::not_found("message"));
            }

            conn.execute(
                "INSERT INTO delivery_receipts (message_id, user_id, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id, user_id) DO UPDATE SET
                     status = CASE WHEN delivery_receipts.status = 'read'
                                   THEN 'read' ELSE excluded.status END,
                     updated_at = excluded.updated_at",
                params![message_id, user_id, status.as_str(), now_timestamp()],
            )?;
            Ok(())
        })
        .op("mark status")?;

        info!(message_id, user_id, status = status.as_str(), "Receipt recorded");
        Ok(())
    }

    /// Marks every listed message as delivered to `viewer_id`, skipping the
    /// viewer's own messages and leaving existing receipts alone. Returns the
    /// number of new receipts.
    pub fn mark_delivered(&self, viewer_id: &str, message_ids: &[String]) -> DbResult<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let marked = self
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                let now = now_timestamp();
                let mut marked = 0;
                {
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO delivery_receipts (message_id, user_id, status, updated_at)
                         SELECT id, ?2, 'delivered', ?3 FROM messages
                         WHERE id = ?1 AND sender_id != ?2
                         ON CONFLICT(message_id, user_id) DO NOTHING",
                    )?;
                    for id in message_ids {
                        marked += stmt.execute(params![id, viewer_id, now])?;
                    }
                }
                tx.commit()?;
                Ok(marked)
            })
            .op("mark delivered")?;

        debug!(viewer_id, marked, "Marked messages delivered");
        Ok(marked)
    }

    /// Receipts of the message's recipients. A receipt the sender left on
    /// their own message is not listed.
    pub fn get_receipts(&self, message_id: &str) -> DbResult<Vec<ReceiptRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.message_id, r.user_id, r.status, r.updated_at
                 FROM delivery_receipts r
                 JOIN messages m ON m.id = r.message_id
                 WHERE r.message_id = ?1 AND r.user_id != m.sender_id
                 ORDER BY r.updated_at, r.user_id",
            )?;
            let rows = stmt
                .query_map([message_id], |row| {
                    Ok(ReceiptRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        status: parse_column(row, 2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .op("get receipts")
    }
}

pub(crate) fn query_receipts(conn: &Connection, message_ids: &[String]) -> DbResult<ReceiptsByMessage> {
    let mut by_message = ReceiptsByMessage::new();
    for chunk in message_ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT message_id, user_id, status FROM delivery_receipts WHERE message_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                parse_column::<ReceiptStatus>(row, 2)?,
            ))
        })?;
        for row in rows {
            let (message_id, user_id, status) = row?;
            by_message.entry(message_id).or_default().push((user_id, status));
        }
    }
    Ok(by_message)
}
