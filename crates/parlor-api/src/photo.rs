use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use parlor_types::validate::validate_photo;

use crate::error::ApiError;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Size-checks an uploaded photo and sniffs it as JPEG or PNG.
pub(crate) fn check_photo(bytes: &[u8]) -> Result<(), ApiError> {
    validate_photo(bytes)?;
    if bytes.starts_with(JPEG_MAGIC) || bytes.starts_with(PNG_MAGIC) {
        Ok(())
    } else {
        Err(ApiError::UnsupportedMedia)
    }
}

pub(crate) fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>, ApiError> {
    B64.decode(encoded)
        .map_err(|_| ApiError::bad_request(format!("{} is not valid base64", field)))
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}


#[cfg(test)]
mod tests {
    use super::*;
    use parlor_types::validate::{MAX_PHOTO_SIZE, ValidationError};

    #[test]
    fn accepts_jpeg_and_png() {
        assert!(check_photo(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]).is_ok());
        assert!(check_photo(&fixtures::png()).is_ok());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(matches!(check_photo(b"GIF89a...."), Err(ApiError::UnsupportedMedia)));
    }

    #[test]
    fn size_is_checked_before_format() {
        assert!(matches!(
            check_photo(&[]),
            Err(ApiError::Invalid(ValidationError::EmptyPhoto))
        ));
        let huge = vec![0u8; MAX_PHOTO_SIZE + 1];
        assert!(matches!(
            check_photo(&huge),
            Err(ApiError::Invalid(ValidationError::PhotoTooLarge { .. }))
        ));
    }
}
