use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or submitted tag does not name a known variant.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Direct and group conversations share one table; the kind decides how the
/// conversation is projected for a viewer and whether its roster can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl FromStr for ConversationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            other => Err(UnknownVariant {
                kind: "conversation kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Photo,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
        }
    }
}

impl FromStr for ContentKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "photo" => Ok(Self::Photo),
            other => Err(UnknownVariant {
                kind: "content kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body. Text is stored as UTF-8 bytes, photos as opaque image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub kind: ContentKind,
    pub value: Vec<u8>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            value: text.into().into_bytes(),
        }
    }

    pub fn photo(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ContentKind::Photo,
            value: bytes.into(),
        }
    }
}

/// What a single recipient has acknowledged for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }
}

impl FromStr for ReceiptStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            other => Err(UnknownVariant {
                kind: "receipt status",
                value: other.to_string(),
            }),
        }
    }
}

/// Message-level rollup of every recipient's receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Folds the receipts of `recipients` into one status.
    ///
    /// `Read` needs a read receipt from every recipient, `Delivered` needs at
    /// least a delivered receipt from every recipient. Receipts from anyone not
    /// listed in `recipients` are ignored. With no recipients the message stays
    /// `Sent`.
    pub fn aggregate<'a, I>(recipients: I, receipts: &HashMap<&str, ReceiptStatus>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any_recipient = false;
        let mut all_read = true;

        for recipient in recipients {
            any_recipient = true;
            match receipts.get(recipient) {
                None => return Self::Sent,
                Some(ReceiptStatus::Delivered) => all_read = false,
                Some(ReceiptStatus::Read) => {}
            }
        }

        match (any_recipient, all_read) {
            (false, _) => Self::Sent,
            (true, true) => Self::Read,
            (true, false) => Self::Delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipts<'a>(pairs: &[(&'a str, ReceiptStatus)]) -> HashMap<&'a str, ReceiptStatus> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn no_recipients_stays_sent() {
        let map = receipts(&[("alice", ReceiptStatus::Read)]);
        assert_eq!(DeliveryStatus::aggregate([], &map), DeliveryStatus::Sent);
    }

    #[test]
    fn one_missing_receipt_keeps_sent() {
        let map = receipts(&[("bob", ReceiptStatus::Read)]);
        assert_eq!(
            DeliveryStatus::aggregate(["bob", "carol"], &map),
            DeliveryStatus::Sent
        );
    }

    #[test]
    fn mixed_receipts_are_delivered() {
        let map = receipts(&[("bob", ReceiptStatus::Read), ("carol", ReceiptStatus::Delivered)]);
        assert_eq!(
            DeliveryStatus::aggregate(["bob", "carol"], &map),
            DeliveryStatus::Delivered
        );
    }

    #[test]
    fn all_read_is_read_and_outsiders_are_ignored() {
        let map = receipts(&[
            ("bob", ReceiptStatus::Read),
            ("carol", ReceiptStatus::Read),
            ("mallory", ReceiptStatus::Delivered),
        ]);
        assert_eq!(
            DeliveryStatus::aggregate(["bob", "carol"], &map),
            DeliveryStatus::Read
        );
    }

    #[test]
    fn kinds_parse_from_their_tags() {
        assert_eq!("group".parse::<ConversationKind>().unwrap(), ConversationKind::Group);
        assert_eq!("photo".parse::<ContentKind>().unwrap(), ContentKind::Photo);
        assert_eq!("read".parse::<ReceiptStatus>().unwrap(), ReceiptStatus::Read);
        assert!("sent".parse::<ReceiptStatus>().is_err());
    }
}
