use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ContentKind, ConversationKind, DeliveryStatus, ReceiptStatus};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Session --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    /// Base64-encoded profile photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: String,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DirectConversationRequest {
    pub peer_id: Option<String>,
    pub peer_username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub kind: ConversationKind,
    pub created_at: DateTime<Utc>,
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessageResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageResponse {
    pub content_type: ContentKind,
    pub preview: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    /// Base64-encoded group photo.
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroupNameRequest {
    pub name: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content_type: ContentKind,
    /// Plain text for `text`, base64 image bytes for `photo`.
    pub content: String,
    /// Base64-encoded opaque attachment.
    pub attachment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub target_conversation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkStatusRequest {
    pub status: ReceiptStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender: SenderResponse,
    pub conversation_id: String,
    pub content_type: ContentKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub reactions: Vec<ReactionResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_from: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SenderResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub user_id: String,
    pub status: ReceiptStatus,
    pub timestamp: DateTime<Utc>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionResponse {
    pub user_id: String,
    pub username: String,
    pub emoji: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_use_camel_case_and_reject_unknown_fields() {
        let req: SendMessageRequest =
            serde_json::from_value(json!({ "contentType": "photo", "content": "AAAA" })).unwrap();
        assert_eq!(req.content_type, ContentKind::Photo);
        assert!(req.attachment.is_none());

        let err = serde_json::from_value::<SendMessageRequest>(
            json!({ "content_type": "text", "content": "hi" }),
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_optionals_are_left_out_of_messages() {
        let msg = MessageResponse {
            id: "m1".into(),
            sender: SenderResponse {
                id: "u1".into(),
                username: "alice".into(),
                photo: None,
            },
            conversation_id: "c1".into(),
            content_type: ContentKind::Text,
            content: "hi".into(),
            timestamp: DateTime::<Utc>::default(),
            status: DeliveryStatus::Sent,
            reactions: Vec::new(),
            attachments: Vec::new(),
            forwarded_from: None,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["conversationId"], "c1");
        assert_eq!(value["contentType"], "text");
        assert_eq!(value["status"], "sent");
        assert!(value.get("attachments").is_none());
        assert!(value.get("forwardedFrom").is_none());
        assert!(value["sender"].get("photo").is_none());
    }
}
