//! Charset and transfer-encoding selection for outgoing text bodies.
//!
//! The composer tries US-ASCII first, then the user's configured
//! charset, then falls back to UTF-8. The transfer encoding is picked
//! by scanning the body: 7bit for safe ASCII, quoted-printable when
//! few bytes need escaping, base64 when the body is mostly non-ASCII.

use crate::encoding::TransferEncoding;

/// Longest line allowed in a 7bit body (RFC 5322 limit, excluding CRLF).
const MAX_SEVEN_BIT_LINE: usize = 998;

/// Ratio of high bytes above which base64 beats quoted-printable.
const BASE64_THRESHOLD: f64 = 0.17;

/// Checks whether a text needs quoted-printable protection against
/// mbox "From " quoting.
///
/// True when the text is, starts with, or contains a line starting
/// with `"From "`. Messages stored in mbox folders would otherwise be
/// corrupted by `>From ` escaping.
#[must_use]
pub fn text_requires_quoted_printable(text: &str) -> bool {
    if text.starts_with("From ") {
        return true;
    }
    text.split('\n').any(|line| line.starts_with("From "))
}

/// Checks whether `data` is representable in `charset`.
///
/// Only US-ASCII and UTF-8 (and their common aliases) can be verified;
/// any other charset is reported as not representable so the caller
/// falls through to the UTF-8 fallback.
fn is_representable(data: &[u8], charset: &str) -> bool {
    if charset.eq_ignore_ascii_case("us-ascii") || charset.eq_ignore_ascii_case("ascii") {
        data.iter().all(u8::is_ascii)
    } else if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        std::str::from_utf8(data).is_ok()
    } else {
        false
    }
}

/// Picks the best transfer encoding for `data` assuming `charset`.
///
/// Returns `None` when the data cannot be represented in the charset.
#[must_use]
pub fn best_encoding(data: &[u8], charset: &str) -> Option<TransferEncoding> {
    if !is_representable(data, charset) {
        return None;
    }

    let high_bytes = data.iter().filter(|b| !b.is_ascii()).count();
    let longest_line = data
        .split(|b| *b == b'\n')
        .map(<[u8]>::len)
        .max()
        .unwrap_or(0);
    let text = String::from_utf8_lossy(data);

    #[allow(clippy::cast_precision_loss)]
    let encoding = if high_bytes == 0
        && longest_line <= MAX_SEVEN_BIT_LINE
        && !text_requires_quoted_printable(&text)
    {
        TransferEncoding::SevenBit
    } else if (high_bytes as f64) <= (data.len() as f64) * BASE64_THRESHOLD {
        TransferEncoding::QuotedPrintable
    } else {
        TransferEncoding::Base64
    };

    Some(encoding)
}

/// Picks the best charset and transfer encoding for a text body.
///
/// Tries US-ASCII first (returning no charset so that no charset
/// parameter is added), then the caller's configured charset, then
/// falls back to UTF-8.
#[must_use]
pub fn best_charset(
    data: &[u8],
    default_charset: Option<&str>,
) -> (Option<String>, TransferEncoding) {
    // First try US-ASCII. A pure-ASCII body never gets a charset
    // parameter, even when long lines or a "From " hazard push it to
    // quoted-printable.
    if let Some(encoding) = best_encoding(data, "us-ascii") {
        return (None, encoding);
    }

    // Next try the user-specified charset for this message
    if let Some(charset) = default_charset {
        if let Some(encoding) = best_encoding(data, charset) {
            return (Some(charset.to_string()), encoding);
        }
    }

    // Fall back to UTF-8
    if let Some(encoding) = best_encoding(data, "utf-8") {
        return (Some("UTF-8".to_string()), encoding);
    }

    // Arbitrary bytes: no text charset applies
    (None, TransferEncoding::Base64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_at_start() {
        assert!(text_requires_quoted_printable("From here to there"));
    }

    #[test]
    fn test_from_line_embedded() {
        assert!(text_requires_quoted_printable(
            "greetings\nFrom the mountain\n"
        ));
    }

    #[test]
    fn test_from_within_line_is_fine() {
        assert!(!text_requires_quoted_printable("a word From the middle"));
    }

    #[test]
    fn test_ascii_is_seven_bit_without_charset() {
        let (charset, encoding) = best_charset(b"plain ascii body\r\n", Some("UTF-8"));
        assert!(charset.is_none());
        assert_eq!(encoding, TransferEncoding::SevenBit);
    }

    #[test]
    fn test_from_line_forces_quoted_printable() {
        let (charset, encoding) = best_charset(b"From the top\r\n", Some("UTF-8"));
        assert!(charset.is_none());
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_long_ascii_body_stays_seven_bit() {
        let body = "short line\r\n".repeat(500);
        let (charset, encoding) = best_charset(body.as_bytes(), Some("UTF-8"));
        assert!(charset.is_none());
        assert_eq!(encoding, TransferEncoding::SevenBit);
    }

    #[test]
    fn test_overlong_line_needs_encoding() {
        let body = "x".repeat(1200);
        let (_, encoding) = best_charset(body.as_bytes(), None);
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_few_high_bytes_quoted_printable() {
        let body = "mostly ascii text with one accent: é and plenty of padding around it";
        let (charset, encoding) = best_charset(body.as_bytes(), Some("UTF-8"));
        assert_eq!(charset.as_deref(), Some("UTF-8"));
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_mostly_high_bytes_base64() {
        let body = "ありがとうございました";
        let (charset, encoding) = best_charset(body.as_bytes(), Some("UTF-8"));
        assert_eq!(charset.as_deref(), Some("UTF-8"));
        assert_eq!(encoding, TransferEncoding::Base64);
    }

    #[test]
    fn test_unverifiable_charset_falls_back_to_utf8() {
        let body = "héllo, and a lot more plain text after it".as_bytes();
        let (charset, encoding) = best_charset(body, Some("ISO-8859-1"));
        assert_eq!(charset.as_deref(), Some("UTF-8"));
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
    }
}
