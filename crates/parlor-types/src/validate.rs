use thiserror::Error;

use crate::models::ContentKind;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 16;
pub const GROUP_NAME_MIN_LEN: usize = 3;
pub const GROUP_NAME_MAX_LEN: usize = 50;
pub const MAX_GROUP_MEMBERS: usize = 100;
pub const MAX_TEXT_LEN: usize = 500;
pub const MAX_EMOJI_LEN: usize = 10;
/// 10 MB cap for profile photos, group photos, photo messages and attachments.
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username must be between {min} and {max} characters", min = USERNAME_MIN_LEN, max = USERNAME_MAX_LEN)]
    UsernameLength,
    #[error("username may only contain letters, digits and underscores")]
    UsernameCharacters,
    #[error("group name must be between {min} and {max} characters", min = GROUP_NAME_MIN_LEN, max = GROUP_NAME_MAX_LEN)]
    InvalidName,
    #[error("a group can have at most {max} members", max = MAX_GROUP_MEMBERS)]
    TooManyMembers,
    #[error("text messages must be between 1 and {max} characters", max = MAX_TEXT_LEN)]
    TextLength,
    #[error("text messages must be valid UTF-8")]
    TextEncoding,
    #[error("photo is empty")]
    EmptyPhoto,
    #[error("photo is {size} bytes, the limit is {max}", max = MAX_PHOTO_SIZE)]
    PhotoTooLarge { size: usize },
    #[error("attachment is {size} bytes, the limit is {max}", max = MAX_PHOTO_SIZE)]
    AttachmentTooLarge { size: usize },
    #[error("emoji must be between 1 and {max} bytes", max = MAX_EMOJI_LEN)]
    EmojiLength,
    #[error("a direct conversation needs two different users")]
    SelfConversation,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::UsernameLength);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ValidationError::UsernameCharacters);
    }
    Ok(())
}

pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if !(GROUP_NAME_MIN_LEN..=GROUP_NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::InvalidName);
    }
    Ok(())
}

/// Empty and oversized photos are reported as different errors.
pub fn validate_photo(photo: &[u8]) -> Result<(), ValidationError> {
    if photo.is_empty() {
        return Err(ValidationError::EmptyPhoto);
    }
    if photo.len() > MAX_PHOTO_SIZE {
        return Err(ValidationError::PhotoTooLarge { size: photo.len() });
    }
    Ok(())
}

pub fn validate_attachment(attachment: &[u8]) -> Result<(), ValidationError> {
    if attachment.len() > MAX_PHOTO_SIZE {
        return Err(ValidationError::AttachmentTooLarge {
            size: attachment.len(),
        });
    }
    Ok(())
}

pub fn validate_content(kind: ContentKind, value: &[u8]) -> Result<(), ValidationError> {
    match kind {
        ContentKind::Text => {
            let text = std::str::from_utf8(value).map_err(|_| ValidationError::TextEncoding)?;
            let len = text.chars().count();
            if len == 0 || len > MAX_TEXT_LEN {
                return Err(ValidationError::TextLength);
            }
            Ok(())
        }
        ContentKind::Photo => validate_photo(value),
    }
}

pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_LEN {
        return Err(ValidationError::EmojiLength);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a_b_9").is_ok());
        assert_eq!(validate_username("al"), Err(ValidationError::UsernameLength));
        assert_eq!(
            validate_username("seventeen_chars_x"),
            Err(ValidationError::UsernameLength)
        );
        assert_eq!(
            validate_username("bad name"),
            Err(ValidationError::UsernameCharacters)
        );
    }

    #[test]
    fn empty_and_oversized_photos_differ() {
        assert_eq!(validate_photo(&[]), Err(ValidationError::EmptyPhoto));
        let big = vec![0u8; MAX_PHOTO_SIZE + 1];
        assert_eq!(
            validate_photo(&big),
            Err(ValidationError::PhotoTooLarge {
                size: MAX_PHOTO_SIZE + 1
            })
        );
        assert!(validate_photo(&[0xFF, 0xD8]).is_ok());
    }

    #[test]
    fn group_names() {
        assert!(validate_group_name("book club").is_ok());
        assert_eq!(validate_group_name("ab"), Err(ValidationError::InvalidName));
        assert_eq!(
            validate_group_name(&"x".repeat(51)),
            Err(ValidationError::InvalidName)
        );
    }

    #[test]
    fn text_content() {
        assert!(validate_content(ContentKind::Text, b"hi").is_ok());
        assert_eq!(
            validate_content(ContentKind::Text, b""),
            Err(ValidationError::TextLength)
        );
        assert_eq!(
            validate_content(ContentKind::Text, &[0xC3, 0x28]),
            Err(ValidationError::TextEncoding)
        );
    }

    #[test]
    fn emoji_bounds() {
        assert!(validate_emoji("👍").is_ok());
        assert_eq!(validate_emoji(""), Err(ValidationError::EmojiLength));
        assert_eq!(validate_emoji("👍👍👍"), Err(ValidationError::EmojiLength));
    }
}
