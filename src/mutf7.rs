//! Modified UTF-7 mailbox-name encoding (RFC 3501 section 5.1.3)
//!
//! Mailbox names travel on the wire in a variant of UTF-7: printable
//! US-ASCII except `&` represents itself, `&` itself is written `&-`,
//! and any other character goes into a `&...-` run of base64 over the
//! UTF-16BE code units -- with `,` standing in for `/` in the base64
//! alphabet and no `=` padding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::alphabet::Alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};

/// The RFC 3501 base64 alphabet: standard base64 with `,` for `/`.
const ALPHABET: Alphabet = match Alphabet::new(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,",
) {
    Ok(alphabet) => alphabet,
    Err(_) => panic!("invalid modified-UTF-7 alphabet"),
};

const B64: GeneralPurpose = GeneralPurpose::new(
    &ALPHABET,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// True for the characters that represent themselves on the wire.
const fn is_direct(c: char) -> bool {
    matches!(c, '\x20'..='\x7e') && c != '&'
}

/// Encode a Unicode mailbox name into its wire form.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut run: Vec<u16> = Vec::new();

    for c in name.chars() {
        if is_direct(c) {
            flush_run(&mut out, &mut run);
            out.push(c);
        } else if c == '&' {
            flush_run(&mut out, &mut run);
            out.push_str("&-");
        } else {
            let mut units = [0_u16; 2];
            run.extend_from_slice(c.encode_utf16(&mut units));
        }
    }
    flush_run(&mut out, &mut run);
    out
}

fn flush_run(out: &mut String, run: &mut Vec<u16>) {
    if run.is_empty() {
        return;
    }
    let mut bytes = Vec::with_capacity(run.len() * 2);
    for unit in run.drain(..) {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    out.push('&');
    out.push_str(&B64.encode(bytes));
    out.push('-');
}

/// Decode a wire mailbox name back into Unicode.
///
/// # Errors
///
/// Fails on an unterminated or malformed `&...-` run, on base64 that
/// does not decode to whole UTF-16 code units, and on unpaired
/// surrogates.
pub fn decode(wire: &str) -> Result<String> {
    let mut out = String::with_capacity(wire.len());
    let mut chars = wire.char_indices();

    while let Some((start, c)) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let rest = &wire[start + 1..];
        let Some(len) = rest.find('-') else {
            return Err(Error::Parse(format!(
                "unterminated modified-UTF-7 run in {wire:?}"
            )));
        };
        let encoded = &rest[..len];
        if encoded.is_empty() {
            out.push('&');
        } else {
            out.push_str(&decode_run(encoded)?);
        }
        // Skip past the consumed run including the trailing '-'.
        for _ in 0..=len {
            chars.next();
        }
    }
    Ok(out)
}

fn decode_run(encoded: &str) -> Result<String> {
    let bytes = B64
        .decode(encoded)
        .map_err(|e| Error::Parse(format!("bad modified-UTF-7 base64 {encoded:?}: {e}")))?;
    if bytes.len() % 2 != 0 {
        return Err(Error::Parse(format!(
            "modified-UTF-7 run {encoded:?} is not whole UTF-16 units"
        )));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|_| Error::Parse(format!("modified-UTF-7 run {encoded:?} is not valid UTF-16")))
}
