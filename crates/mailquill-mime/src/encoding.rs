//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fmt::Write as _;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Encodes data as Base64 without line breaks.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped to 76-character lines with CRLF,
/// as required for message bodies (RFC 2045).
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        // Chunks of an ASCII string are valid UTF-8.
        result.push_str(&String::from_utf8_lossy(chunk));
        result.push_str("\r\n");
    }
    result
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Maximum line length for Quoted-Printable and Base64 encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Encodes bytes that are not printable ASCII or would interfere
/// with email transmission. Line breaks in the input are preserved.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();
    let mut line_length = 0;
    let mut bytes = text.as_bytes().iter().peekable();

    while let Some(byte) = bytes.next() {
        // Preserve hard line breaks.
        if *byte == b'\r' && bytes.peek() == Some(&&b'\n') {
            bytes.next();
            result.push_str("\r\n");
            line_length = 0;
            continue;
        }
        if *byte == b'\n' {
            result.push_str("\r\n");
            line_length = 0;
            continue;
        }

        // Check if we need a soft line break
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        match byte {
            // Printable ASCII except '=' and space (handled separately)
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(*byte as char);
                line_length += 1;
            }
            // Space needs special handling (encode at line end)
            b' ' => {
                if line_length >= MAX_LINE_LENGTH - 1 {
                    result.push_str("=20");
                    line_length += 3;
                } else {
                    result.push(' ');
                    line_length += 1;
                }
            }
            // Everything else gets encoded
            _ => {
                result.push('=');
                let _ = write!(result, "{byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next(); // consume \r
                if chars.peek() == Some(&'\n') {
                    chars.next(); // consume \n
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next(); // consume \n
                continue;
            }

            // Hex encoded byte
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else {
            let mut buf = [0u8; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    // Only encode if necessary (contains non-ASCII)
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return Ok(text.to_string());
    }

    // Use Base64 encoding (Q encoding is more complex)
    let encoded = encode_base64(text.as_bytes());
    Ok(format!("=?{charset}?B?{encoded}?="))
}

/// Decodes RFC 2047 encoded header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if the input is not valid RFC 2047 format.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    // Check for RFC 2047 format
    if !text.starts_with("=?") || !text.ends_with("?=") {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xAB_u8; 120];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.lines() {
            assert!(line.len() <= 76);
        }
        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        let text = "Hello, World!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "Hello, World!");

        let text = "Héllo, Wørld!";
        let encoded = encode_quoted_printable(text);
        assert!(encoded.contains("=C3"));
    }

    #[test]
    fn test_quoted_printable_preserves_line_breaks() {
        let text = "line one\r\nline two\r\n";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "line one\r\nline two\r\n");
    }

    #[test]
    fn test_quoted_printable_decode() {
        let encoded = "H=C3=A9llo";
        let decoded = decode_quoted_printable(encoded).unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let encoded = "Hello=\r\nWorld";
        let decoded = decode_quoted_printable(encoded).unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_round_trip() {
        let text = "From the start, with non-ASCII: é ü ø\r\nsecond line";
        let encoded = encode_quoted_printable(text);
        let decoded = decode_quoted_printable(&encoded).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_rfc2047_encode() {
        let encoded = encode_rfc2047("Hello", "utf-8").unwrap();
        assert_eq!(encoded, "Hello"); // No encoding needed

        let encoded = encode_rfc2047("Héllo", "utf-8").unwrap();
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_rfc2047_decode() {
        let decoded = decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");

        let decoded = decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }
}
