//! # Cursor Utilities
//!
//! Encoding and decoding of opaque pagination cursors for the property
//! search endpoint, with validation of untrusted input.

use axum::http::StatusCode;
use base64::Engine;

use crate::error::ApiError;
use crate::repositories::extracted_property::CursorData;

/// Encode cursor data as an opaque base64 string
pub fn encode_cursor(cursor: &CursorData) -> String {
    let json = serde_json::to_string(cursor).expect("cursor serializes");
    base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
}

/// Decode cursor data from an opaque base64 string with validation
pub fn decode_cursor(cursor: &str) -> Result<CursorData, ApiError> {
    if cursor.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "cursor cannot be empty",
        ));
    }

    // Bound input size before any decoding work.
    if cursor.len() > 1000 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "cursor is too long",
        ));
    }

    if !cursor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "cursor contains invalid characters",
        ));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "cursor is not valid base64",
            )
        })?;

    if decoded.is_empty() || decoded.len() > 500 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "decoded cursor has invalid size",
        ));
    }

    let json = String::from_utf8(decoded).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "cursor contains invalid UTF-8 data",
        )
    })?;

    serde_json::from_str(&json).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "cursor contains invalid JSON structure",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn round_trip() {
        let cursor = CursorData {
            created_at: Utc::now(),
            id: Uuid::new_v4(),
        };

        let encoded = encode_cursor(&cursor);
        let decoded = decode_cursor(&encoded).expect("decodes");

        assert_eq!(decoded.id, cursor.id);
        assert_eq!(decoded.created_at, cursor.created_at);
    }

    #[test]
    fn rejects_empty_cursor() {
        assert!(decode_cursor("").is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(decode_cursor("abc$def").is_err());
    }

    #[test]
    fn rejects_non_base64() {
        assert!(decode_cursor("!!!").is_err());
    }

    #[test]
    fn rejects_oversized_cursor() {
        let oversized = "A".repeat(1001);
        assert!(decode_cursor(&oversized).is_err());
    }

    #[test]
    fn rejects_valid_base64_with_wrong_structure() {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(br#"{"unexpected":"shape"}"#);
        assert!(decode_cursor(&encoded).is_err());
    }
}
