use std::collections::HashMap;

use anyhow::anyhow;
use parlor_types::models::{ContentKind, DeliveryStatus, MessageContent};
use parlor_types::validate::{validate_attachment, validate_content};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::conversations::{conversation_exists, member_ids};
use crate::error::DbResultExt;
use crate::models::MessageRow;
use crate::reactions::query_reactions;
use crate::receipts::query_receipts;
use crate::{Database, DbError, DbResult, new_id, now_timestamp, parse_column};

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, u.username, u.photo,
     m.content_kind, m.content, m.attachment, m.forwarded_from, m.created_at";

impl Database {
    /// Appends a message. Id and timestamp are assigned here; the message
    /// starts out `sent`.
    pub fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &MessageContent,
        attachment: Option<&[u8]>,
    ) -> DbResult<MessageRow> {
        validate_content(content.kind, &content.value)?;
        if let Some(attachment) = attachment {
            validate_attachment(attachment)?;
        }

        let message = self
            .with_conn(|conn| {
                if !conversation_exists(conn, conversation_id)? {
                    return Err(DbError::not_found("conversation"));
                }
                let id = new_id();
                insert_message(conn, &id, conversation_id, sender_id, content, attachment, None)?;
                load_message(conn, &id)
            })
            .op("send message")?;

        info!(
            message_id = %message.id,
            conversation_id,
            kind = %message.content_kind,
            "Message sent"
        );
        Ok(message)
    }

    /// Copies a message into `target_conversation_id` under the forwarder's
    /// name. The copy is a new, independent row that remembers its source.
    pub fn forward_message(
        &self,
        original_id: &str,
        target_conversation_id: &str,
        forwarder_id: &str,
    ) -> DbResult<MessageRow> {
        let message = self
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                let original = tx
                    .query_row(
                        "SELECT content_kind, content, attachment FROM messages WHERE id = ?1",
                        [original_id],
                        |r| {
                            Ok((
                                MessageContent {
                                    kind: parse_column(r, 0)?,
                                    value: r.get(1)?,
                                },
                                r.get::<_, Option<Vec<u8>>>(2)?,
                            ))
                        },
                    )
                    .optional()?;
                let (content, attachment) = original.ok_or_else(|| DbError::not_found("message"))?;

                if !conversation_exists(&tx, target_conversation_id)? {
                    return Err(DbError::not_found("conversation"));
                }

                let id = new_id();
                insert_message(
                    &tx,
                    &id,
                    target_conversation_id,
                    forwarder_id,
                    &content,
                    attachment.as_deref(),
                    Some(original_id),
                )?;
                tx.commit()?;
                load_message(conn, &id)
            })
            .op("forward message")?;

        info!(
            message_id = %message.id,
            original_id,
            conversation_id = target_conversation_id,
            "Message forwarded"
        );
        Ok(message)
    }

    /// The conversation's messages, oldest first, with reactions and
    /// aggregate status filled in.
    pub fn list_messages(&self, conversation_id: &str) -> DbResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at ASC, m.rowid ASC"
            ))?;
            let mut rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            enrich(conn, &mut rows)?;
            debug!(conversation_id, count = rows.len(), "Loaded messages");
            Ok(rows)
        })
        .op("list messages")
    }

    pub fn get_message(&self, message_id: &str) -> DbResult<MessageRow> {
        self.with_conn(|conn| load_message(conn, message_id))
            .op("get message")
    }

    /// Deletes a message on behalf of its sender.
    ///
    /// Exactly one row is removed or the call fails: `Forbidden` when the
    /// message exists in the conversation but belongs to someone else,
    /// `NotFound` when it does not exist there at all. Reactions and receipts
    /// go with it.
    pub fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        requester_id: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND conversation_id = ?2 AND sender_id = ?3",
                params![message_id, conversation_id, requester_id],
            )?;
            if deleted == 1 {
                return Ok(());
            }

            let exists = conn
                .query_row(
                    "SELECT 1 FROM messages WHERE id = ?1 AND conversation_id = ?2",
                    params![message_id, conversation_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                Err(DbError::forbidden("only the sender can delete a message"))
            } else {
                Err(DbError::not_found("message"))
            }
        })
        .op("delete message")?;

        info!(message_id, conversation_id, "Message deleted");
        Ok(())
    }
}

fn insert_message(
    conn: &Connection,
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    content: &MessageContent,
    attachment: Option<&[u8]>,
    forwarded_from: Option<&str>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO messages
             (id, conversation_id, sender_id, content_kind, content, attachment, forwarded_from, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            conversation_id,
            sender_id,
            content.kind.as_str(),
            content.value,
            attachment,
            forwarded_from,
            now_timestamp(),
        ],
    )?;
    Ok(())
}

fn load_message(conn: &Connection, message_id: &str) -> DbResult<MessageRow> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.id = ?1"
            ),
            [message_id],
            message_from_row,
        )
        .optional()?;

    let mut rows = vec![row.ok_or_else(|| DbError::not_found("message"))?];
    enrich(conn, &mut rows)?;
    rows.pop()
        .ok_or_else(|| anyhow!("message {} lost during enrichment", message_id).into())
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    let content_kind: ContentKind = parse_column(row, 5)?;
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        sender_photo: row.get(4)?,
        content_kind,
        content: row.get(6)?,
        attachment: row.get(7)?,
        forwarded_from: row.get(8)?,
        created_at: row.get(9)?,
        status: DeliveryStatus::Sent,
        reactions: Vec::new(),
    })
}

/// Batch-loads reactions and receipts for `rows` and computes each
/// message's aggregate status against its conversation's current roster.
fn enrich(conn: &Connection, rows: &mut [MessageRow]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut reactions = HashMap::<String, Vec<_>>::new();
    for reaction in query_reactions(conn, &ids)? {
        reactions
            .entry(reaction.message_id.clone())
            .or_default()
            .push(reaction);
    }

    let receipts = query_receipts(conn, &ids)?;

    let mut rosters: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows.iter() {
        if !rosters.contains_key(&row.conversation_id) {
            let members = member_ids(conn, &row.conversation_id)?;
            rosters.insert(row.conversation_id.clone(), members);
        }
    }

    let empty = Vec::new();
    for row in rows.iter_mut() {
        row.reactions = reactions.remove(&row.id).unwrap_or_default();

        let recipients = rosters
            .get(&row.conversation_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|member| *member != row.sender_id);
        let by_user: HashMap<&str, _> = receipts
            .get(&row.id)
            .unwrap_or(&empty)
            .iter()
            .map(|(user, status)| (user.as_str(), *status))
            .collect();
        row.status = DeliveryStatus::aggregate(recipients, &by_user);
    }
    Ok(())
}
