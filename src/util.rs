//! Shared utility functions

/// Truncate a string to at most `max_bytes` without splitting a UTF-8
/// character.
///
/// If the string already fits it is returned unchanged. Otherwise the
/// slice ends at the last character boundary at or before `max_bytes`,
/// so the result is always valid UTF-8 and never longer than asked for.
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorter_than_max_unchanged() {
        assert_eq!(truncate_utf8_safe("hello", 10), "hello");
    }

    #[test]
    fn test_truncates_at_ascii_boundary() {
        assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
    }

    #[test]
    fn test_respects_multibyte_boundaries() {
        // Each character is 3 bytes; cutting at 4 must back up to 3
        let s = "日本語";
        assert_eq!(truncate_utf8_safe(s, 4), "日");
        assert_eq!(truncate_utf8_safe(s, 6), "日本");
        assert!(truncate_utf8_safe(s, 4).len() <= 4);
    }

    #[test]
    fn test_empty_and_zero() {
        assert_eq!(truncate_utf8_safe("", 5), "");
        assert_eq!(truncate_utf8_safe("hello", 0), "");
    }
}
