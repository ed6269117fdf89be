//! Lexical surface of the response grammar
//!
//! Byte-level primitives shared by every parser in this module tree.
//! All parsers are nom *streaming*: a buffer that ends mid-token
//! yields `Incomplete`, never a false error.

use abnf_core::streaming::{crlf, dquote};
use nom::{
    IResult,
    branch::alt,
    bytes::streaming::{escaped, tag, tag_no_case, take, take_while_m_n, take_while1},
    character::streaming::digit1,
    combinator::{map, map_res, not, opt, value},
    multi::separated_list0,
    sequence::{delimited, terminated},
};
use std::str::from_utf8;

/// `atom-specials` per RFC 3501 section 9, including resp-specials.
pub(crate) fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7e)
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b']')
}

pub(crate) fn is_astring_char(b: u8) -> bool {
    is_atom_char(b) || b == b']'
}

fn is_quoted_byte(b: u8) -> bool {
    // Bytes above 0x7f are preserved as-is; only CR, LF and the two
    // quoted-specials terminate or escape.
    !matches!(b, b'\r' | b'\n' | b'"' | b'\\')
}

/// One or more spaces. The grammar mandates a single SP; real servers
/// occasionally send more, so the reader is lenient.
pub(crate) fn sp1(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|b| b == b' ')(input)
}

/// `CRLF` terminating a response line.
pub(crate) fn line_end(input: &[u8]) -> IResult<&[u8], ()> {
    value((), crlf)(input)
}

/// `number = 1*DIGIT` (u32)
pub(crate) fn number(input: &[u8]) -> IResult<&[u8], u32> {
    map_res(digit1, |digits: &[u8]| {
        from_utf8(digits)
            .map_err(|_| ())
            .and_then(|s| s.parse::<u32>().map_err(|_| ()))
    })(input)
}

/// `number64 = 1*DIGIT` (u64, for sizes that may exceed 32 bits)
pub(crate) fn number64(input: &[u8]) -> IResult<&[u8], u64> {
    map_res(digit1, |digits: &[u8]| {
        from_utf8(digits)
            .map_err(|_| ())
            .and_then(|s| s.parse::<u64>().map_err(|_| ()))
    })(input)
}

/// `nz-number = digit-nz *DIGIT`
pub(crate) fn nz_number(input: &[u8]) -> IResult<&[u8], u32> {
    map_res(number, |n| if n == 0 { Err(()) } else { Ok(n) })(input)
}

/// `atom = 1*ATOM-CHAR`
pub(crate) fn atom(input: &[u8]) -> IResult<&[u8], String> {
    map(take_while1(is_atom_char), |bytes: &[u8]| {
        String::from_utf8_lossy(bytes).into_owned()
    })(input)
}

/// `nil = "NIL"`, not followed by another atom character (so the atom
/// `NILE` never half-matches).
pub(crate) fn nil(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(
        tag_no_case(b"NIL"),
        not(take_while_m_n(1, 1, is_atom_char)),
    )(input)
}

/// `quoted = DQUOTE *QUOTED-CHAR DQUOTE` with `\\` and `\"` as the
/// only escapes. Bytes >= 0x80 pass through untouched.
pub(crate) fn quoted_bytes(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        delimited(
            dquote,
            map(
                opt(escaped(
                    take_while1(is_quoted_byte),
                    '\\',
                    nom::character::streaming::one_of("\\\""),
                )),
                Option::unwrap_or_default,
            ),
            dquote,
        ),
        unescape_quoted,
    )(input)
}

fn unescape_quoted(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter();
    while let Some(&b) = bytes.next() {
        if b == b'\\' {
            if let Some(&escaped_byte) = bytes.next() {
                out.push(escaped_byte);
            }
        } else {
            out.push(b);
        }
    }
    out
}

pub(crate) fn quoted_utf8(input: &[u8]) -> IResult<&[u8], String> {
    map(quoted_bytes, |bytes| {
        String::from_utf8_lossy(&bytes).into_owned()
    })(input)
}

/// `literal = "{" number "}" CRLF *CHAR8` -- octet-exact opaque bytes.
/// The CRLF sits *before* the payload; nothing follows the payload.
pub(crate) fn literal_bytes(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (rest, len) = delimited(tag(b"{"), number, tag(b"}"))(input)?;
    let (rest, _) = line_end(rest)?;
    let (rest, data) = take(len as usize)(rest)?;
    Ok((rest, data.to_vec()))
}

/// `string = quoted / literal`
pub(crate) fn string_bytes(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    alt((quoted_bytes, literal_bytes))(input)
}

pub(crate) fn string_utf8(input: &[u8]) -> IResult<&[u8], String> {
    map(string_bytes, |bytes| {
        String::from_utf8_lossy(&bytes).into_owned()
    })(input)
}

/// `nstring = string / nil` -- `None` is NIL, `Some(vec![])` is `""`.
pub(crate) fn nstring(input: &[u8]) -> IResult<&[u8], Option<Vec<u8>>> {
    alt((map(nil, |_| None), map(string_bytes, Some)))(input)
}

pub(crate) fn nstring_utf8(input: &[u8]) -> IResult<&[u8], Option<String>> {
    map(nstring, |bytes| {
        bytes.map(|b| String::from_utf8_lossy(&b).into_owned())
    })(input)
}

/// `astring = 1*ASTRING-CHAR / string`
pub(crate) fn astring_utf8(input: &[u8]) -> IResult<&[u8], String> {
    alt((
        map(take_while1(is_astring_char), |bytes: &[u8]| {
            String::from_utf8_lossy(bytes).into_owned()
        }),
        string_utf8,
    ))(input)
}

/// `text = 1*TEXT-CHAR`; bytes >= 0x80 are tolerated and decoded
/// lossily (header junk happens).
pub(crate) fn text(input: &[u8]) -> IResult<&[u8], String> {
    map(
        take_while1(|b| b != b'\r' && b != b'\n'),
        |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned(),
    )(input)
}

/// A balanced `( ... )` list of `f`, possibly empty, tolerating
/// leading/trailing/multiple spaces.
pub(crate) fn parenthesized_list<'a, T, F>(
    mut f: F,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<T>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
{
    move |input: &'a [u8]| {
        let (rest, _) = tag(b"(")(input)?;
        let (rest, _) = opt(sp1)(rest)?;
        let (rest, items) = separated_list0(sp1, &mut f)(rest)?;
        let (rest, _) = opt(sp1)(rest)?;
        let (rest, _) = tag(b")")(rest)?;
        Ok((rest, items))
    }
}

/// A `( ... )` wrapper around a single inner parser.
pub(crate) fn paren_delimited<'a, T, F>(
    mut f: F,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], T>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
{
    move |input: &'a [u8]| delimited(tag(b"("), &mut f, tag(b")"))(input)
}
