//! Local checks on book and video ids before they are sent upstream.

use serde::Serialize;

pub const MIN_VIDEO_ID_LEN: usize = 10;
pub const MAX_VIDEO_ID_LEN: usize = 20;

/// Strips the quote characters clients tend to paste along with an id.
pub fn clean_video_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Machine-readable cause of a rejection, sent as `reason_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionKind {
    Format,
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: &'static str,
    pub reason: String,
    pub suggestions: Vec<&'static str>,
}

/// Checks a cleaned id: digits only, then a length within
/// [`MIN_VIDEO_ID_LEN`]..=[`MAX_VIDEO_ID_LEN`].
pub fn validate_video_id(id: &str) -> Result<(), Rejection> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(Rejection {
            kind: RejectionKind::Format,
            message: "Invalid video ID format",
            reason: "Video ID should contain only numbers".to_string(),
            suggestions: vec![
                "Remove any quotes or special characters",
                "Ensure the ID contains only digits",
                "Check the video ID format",
            ],
        });
    }

    let len = id.len();
    if !(MIN_VIDEO_ID_LEN..=MAX_VIDEO_ID_LEN).contains(&len) {
        return Err(Rejection {
            kind: RejectionKind::Length,
            message: "Invalid video ID length",
            reason: format!(
                "Video ID length {len} is not within expected range ({MIN_VIDEO_ID_LEN}-{MAX_VIDEO_ID_LEN})"
            ),
            suggestions: vec![
                "Verify the video ID is complete",
                "Check for missing digits",
                "Ensure no extra characters are included",
            ],
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_strips_quotes_and_whitespace() {
        assert_eq!(clean_video_id(" '7312345678901' "), "7312345678901");
        assert_eq!(clean_video_id("\"12`34\""), "1234");
        assert_eq!(clean_video_id(""), "");
    }

    #[test]
    fn short_numeric_id_fails_on_length() {
        let rejection = validate_video_id("12345").unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Length);
        assert!(rejection.reason.contains("length 5"));
    }

    #[test]
    fn letters_fail_on_format_before_length() {
        let rejection = validate_video_id("abc1234567").unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Format);
        assert_eq!(rejection.message, "Invalid video ID format");
        assert_eq!(rejection.suggestions.len(), 3);
    }

    #[test]
    fn thirteen_digits_pass() {
        assert!(validate_video_id("1234567890123").is_ok());
        assert!(validate_video_id("1234567890").is_ok());
        assert!(validate_video_id("12345678901234567890").is_ok());
        assert!(validate_video_id("123456789012345678901").is_err());
    }

    #[test]
    fn empty_id_is_a_format_error() {
        assert_eq!(validate_video_id("").unwrap_err().kind, RejectionKind::Format);
    }

    #[test]
    fn rejection_kinds_serialize_lowercase() {
        assert_eq!(serde_json::to_value(RejectionKind::Format).unwrap(), "format");
        assert_eq!(serde_json::to_value(RejectionKind::Length).unwrap(), "length");
    }
}
