//! Database row types. These map directly to SQLite rows and are kept
//! separate from the JSON shapes in parlor-types so the store stays independent
//! of the HTTP surface. Timestamps are the stored RFC 3339 strings.

use parlor_types::models::{ContentKind, ConversationKind, DeliveryStatus, ReceiptStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub photo: Option<Vec<u8>>,
    pub created_at: String,
}

/// A conversation as seen by one viewer. For direct conversations the
/// display name and photo are the other member's username and photo.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: String,
    pub kind: ConversationKind,
    pub display_name: String,
    pub photo: Option<Vec<u8>>,
    pub created_at: String,
    pub members: Vec<String>,
    pub last_message: Option<LastMessageRow>,
}

#[derive(Debug, Clone)]
pub struct LastMessageRow {
    pub content_kind: ContentKind,
    pub preview: String,
    pub sender_id: String,
    pub created_at: String,
}

/// A ledger row enriched with its sender, reactions and aggregate status.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_photo: Option<Vec<u8>>,
    pub content_kind: ContentKind,
    pub content: Vec<u8>,
    pub attachment: Option<Vec<u8>>,
    pub forwarded_from: Option<String>,
    pub created_at: String,
    pub status: DeliveryStatus,
    pub reactions: Vec<ReactionRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub username: String,
    pub emoji: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRow {
    pub message_id: String,
    pub user_id: String,
    pub status: ReceiptStatus,
    pub updated_at: String,
}
