//! Store rows to JSON shapes.

use chrono::{DateTime, Utc};
use parlor_db::models::{ConversationSummary, MessageRow, ReactionRow, ReceiptRow, UserRow};
use parlor_types::api::{
    ConversationResponse, LastMessageResponse, MessageResponse, ReactionResponse, ReceiptResponse,
    SenderResponse, UserResponse,
};
use parlor_types::models::ContentKind;
use tracing::warn;

use crate::photo::encode_base64;

fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on {}: {}", raw, what, e);
        DateTime::default()
    })
}

pub(crate) fn user(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        username: row.username,
        photo: row.photo.as_deref().map(encode_base64),
    }
}

pub(crate) fn conversation(
    summary: ConversationSummary,
    messages: Option<Vec<MessageRow>>,
) -> ConversationResponse {
    let created_at = parse_timestamp(&summary.created_at, "conversation");
    ConversationResponse {
        conversation_id: summary.id,
        display_name: summary.display_name,
        photo: summary.photo.as_deref().map(encode_base64),
        kind: summary.kind,
        created_at,
        members: summary.members,
        messages: messages.map(|rows| rows.into_iter().map(message).collect()),
        last_message: summary.last_message.map(|last| LastMessageResponse {
            content_type: last.content_kind,
            timestamp: parse_timestamp(&last.created_at, "last message"),
            preview: last.preview,
            sender_id: last.sender_id,
        }),
    }
}

pub(crate) fn message(row: MessageRow) -> MessageResponse {
    let content = match row.content_kind {
        ContentKind::Text => String::from_utf8_lossy(&row.content).into_owned(),
        ContentKind::Photo => encode_base64(&row.content),
    };

    MessageResponse {
        timestamp: parse_timestamp(&row.created_at, "message"),
        sender: SenderResponse {
            id: row.sender_id,
            username: row.sender_username,
            photo: row.sender_photo.as_deref().map(encode_base64),
        },
        id: row.id,
        conversation_id: row.conversation_id,
        content_type: row.content_kind,
        content,
        status: row.status,
        reactions: row.reactions.into_iter().map(reaction).collect(),
        attachments: row.attachment.as_deref().map(encode_base64).into_iter().collect(),
        forwarded_from: row.forwarded_from,
    }
}

pub(crate) fn reaction(row: ReactionRow) -> ReactionResponse {
    ReactionResponse {
        user_id: row.user_id,
        username: row.username,
        emoji: row.emoji,
    }
}

pub(crate) fn receipt(row: ReceiptRow) -> ReceiptResponse {
    ReceiptResponse {
        timestamp: parse_timestamp(&row.updated_at, "receipt"),
        user_id: row.user_id,
        status: row.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2024-05-01T12:30:00.123456Z", "test");
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00.123456+00:00");
    }

    #[test]
    fn corrupt_timestamps_fall_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday", "test"), DateTime::<Utc>::default());
    }
}
