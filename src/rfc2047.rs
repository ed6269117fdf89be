//! RFC 2047 encoded-word decoding
//!
//! Subjects and display names arrive as `=?charset?enc?payload?=`
//! tokens. Decoding is best-effort: anything malformed, and any
//! charset outside UTF-8 / US-ASCII / ISO-8859-1, is left verbatim.
//! Whitespace between two adjacent encoded words is dropped per the
//! RFC; whitespace next to plain text is kept.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decode all encoded words in a header value.
#[must_use]
pub fn decode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let before = &rest[..start];
        match parse_word(&rest[start..]) {
            Some((decoded, consumed)) => {
                if !(last_was_encoded && before.chars().all(char::is_whitespace)) {
                    out.push_str(before);
                }
                out.push_str(&decoded);
                last_was_encoded = true;
                rest = &rest[start + consumed..];
            }
            None => {
                out.push_str(before);
                out.push_str("=?");
                last_was_encoded = false;
                rest = &rest[start + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse one `=?charset?enc?payload?=` at the start of `input`.
/// Returns the decoded text and the number of bytes consumed.
fn parse_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let (payload, _) = body.split_once("?=")?;

    // Encoded words are short tokens; a run-away match means we
    // grabbed unrelated text.
    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(payload).ok()?,
        "Q" | "q" => decode_q(payload)?,
        _ => return None,
    };
    let decoded = decode_charset(charset, &bytes)?;
    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + payload.len() + 2;
    Some((decoded, consumed))
}

/// Q encoding: `_` is space, `=XX` is a hex-escaped byte.
fn decode_q(payload: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len());
    let mut bytes = payload.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = bytes.next()?;
                let lo = bytes.next()?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

fn decode_charset(charset: &str, bytes: &[u8]) -> Option<String> {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        String::from_utf8(bytes.to_vec()).ok()
    } else if charset.eq_ignore_ascii_case("us-ascii") || charset.eq_ignore_ascii_case("ascii") {
        bytes
            .is_ascii()
            .then(|| String::from_utf8_lossy(bytes).into_owned())
    } else if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1") {
        // Latin-1 maps byte-for-byte onto the first 256 code points.
        Some(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        None
    }
}
