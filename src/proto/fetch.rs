//! FETCH attribute grammar: message attributes, ENVELOPE, and
//! BODYSTRUCTURE
//!
//! BODYSTRUCTURE is the loosest corner of RFC 3501: servers truncate
//! trailing extension fields freely and disagree on spacing. The
//! parsers here read the fixed-order fields greedily and treat
//! anything missing before the closing `)` as absent.

use super::core::{
    nil, nstring, nstring_utf8, number, paren_delimited, parenthesized_list, quoted_utf8, sp1,
    string_utf8,
};
use super::response::flag_list;
use super::types::{
    Address, AttributeValue, BodyStructure, Envelope, MessageBody, PartExtension, Section,
    SectionText,
};
use nom::{
    IResult,
    branch::alt,
    bytes::streaming::{tag, tag_no_case},
    combinator::{map, opt},
    error::{ErrorKind, make_error},
    multi::{many0, many1, separated_list1},
    sequence::{preceded, separated_pair, terminated, tuple},
};

/// Nesting allowance for recursive structures. Deep enough for any
/// real message, shallow enough to keep a hostile server off the
/// stack.
const MAX_DEPTH: usize = 16;

// ----- ENVELOPE -----

/// `address = "(" addr-name SP addr-adl SP addr-mailbox SP addr-host ")"`
fn address(input: &[u8]) -> IResult<&[u8], Address> {
    paren_delimited(map(
        tuple((nstring, sp1, nstring, sp1, nstring, sp1, nstring)),
        |(name, _, adl, _, mailbox, _, host)| Address {
            name,
            adl,
            mailbox,
            host,
        },
    ))(input)
}

/// NIL or a parenthesized run of addresses. Some servers omit the
/// space between consecutive addresses.
fn address_list(input: &[u8]) -> IResult<&[u8], Option<Vec<Address>>> {
    alt((
        map(nil, |_| None),
        map(
            paren_delimited(many1(terminated(address, opt(sp1)))),
            Some,
        ),
    ))(input)
}

/// The ten-element ENVELOPE list (RFC 3501 section 7.4.2).
pub(crate) fn envelope(input: &[u8]) -> IResult<&[u8], Envelope> {
    paren_delimited(map(
        tuple((
            nstring,
            sp1,
            nstring,
            sp1,
            address_list,
            sp1,
            address_list,
            sp1,
            address_list,
            sp1,
            address_list,
            sp1,
            address_list,
            sp1,
            address_list,
            sp1,
            nstring,
            sp1,
            nstring,
        )),
        |(
            date,
            _,
            subject,
            _,
            from,
            _,
            sender,
            _,
            reply_to,
            _,
            to,
            _,
            cc,
            _,
            bcc,
            _,
            in_reply_to,
            _,
            message_id,
        )| Envelope {
            date,
            subject,
            from,
            sender,
            reply_to,
            to,
            cc,
            bcc,
            in_reply_to,
            message_id,
        },
    ))(input)
}

// ----- BODYSTRUCTURE -----

/// `body-fld-param = "(" string SP string *(SP string SP string) ")" / nil`
fn param_list(input: &[u8]) -> IResult<&[u8], Vec<(String, String)>> {
    alt((
        map(nil, |_| Vec::new()),
        parenthesized_list(separated_pair(string_utf8, sp1, string_utf8)),
    ))(input)
}

/// `body-fld-dsp = "(" string SP body-fld-param ")" / nil`
fn disposition(input: &[u8]) -> IResult<&[u8], Option<(String, Vec<(String, String)>)>> {
    alt((
        map(nil, |_| None),
        map(
            paren_delimited(separated_pair(string_utf8, sp1, param_list)),
            Some,
        ),
    ))(input)
}

/// `body-fld-lang = nstring / "(" string *(SP string) ")"`
fn language(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    alt((
        parenthesized_list(string_utf8),
        map(nstring_utf8, |lang| lang.map_or_else(Vec::new, |l| vec![l])),
    ))(input)
}

/// `body-extension` values past the fields this engine models are
/// consumed and discarded. Recursively defined, so nesting is capped.
fn skip_extension(depth: usize) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |input: &[u8]| skip_extension_limited(input, depth)
}

fn skip_extension_limited(input: &[u8], depth: usize) -> IResult<&[u8], ()> {
    if depth == 0 {
        return Err(nom::Err::Failure(make_error(input, ErrorKind::TooLarge)));
    }
    alt((
        map(nstring, |_| ()),
        map(number, |_| ()),
        map(parenthesized_list(skip_extension(depth - 1)), |_| ()),
    ))(input)
}

/// Greedy tail shared by single- and multi-part extension data:
/// `[SP body-fld-dsp [SP body-fld-lang [SP body-fld-loc *(SP ext)]]]`
#[allow(clippy::type_complexity)]
fn extension_tail(
    input: &[u8],
) -> IResult<
    &[u8],
    (
        Option<(String, Vec<(String, String)>)>,
        Vec<String>,
        Option<String>,
    ),
> {
    let (rest, dsp) = opt(preceded(sp1, disposition))(input)?;
    if dsp.is_none() {
        return Ok((input, (None, Vec::new(), None)));
    }
    let (rest, lang) = opt(preceded(sp1, language))(rest)?;
    let (rest, loc) = opt(preceded(sp1, nstring_utf8))(rest)?;
    let (rest, _) = many0(preceded(sp1, skip_extension(MAX_DEPTH)))(rest)?;
    Ok((
        rest,
        (
            dsp.flatten(),
            lang.unwrap_or_default(),
            loc.flatten(),
        ),
    ))
}

pub(crate) fn body_structure(input: &[u8]) -> IResult<&[u8], BodyStructure> {
    body(input, MAX_DEPTH)
}

fn body(input: &[u8], depth: usize) -> IResult<&[u8], BodyStructure> {
    if depth == 0 {
        return Err(nom::Err::Failure(make_error(input, ErrorKind::TooLarge)));
    }
    let (rest, _) = tag(b"(")(input)?;
    // A leading list means multipart children; a leading string means
    // a single part.
    let (rest, parsed) = if rest.first() == Some(&b'(') {
        multipart(rest, depth)?
    } else {
        single_part(rest, depth)?
    };
    let (rest, _) = opt(sp1)(rest)?;
    let (rest, _) = tag(b")")(rest)?;
    Ok((rest, parsed))
}

/// `body-type-mpart = 1*body SP media-subtype [SP body-ext-mpart]`
fn multipart(input: &[u8], depth: usize) -> IResult<&[u8], BodyStructure> {
    let (rest, parts) = many1(terminated(|i| body(i, depth - 1), opt(sp1)))(input)?;
    let (rest, subtype) = string_utf8(rest)?;
    let (rest, parameters) = opt(preceded(sp1, param_list))(rest)?;
    let (rest, (disposition, language, location)) = extension_tail(rest)?;
    Ok((
        rest,
        BodyStructure::Multi {
            parts,
            subtype,
            parameters: parameters.unwrap_or_default(),
            disposition,
            language,
            location,
        },
    ))
}

/// `body-type-1part` with its fixed field order:
/// type subtype params id description encoding size, then the
/// text / message/rfc822 specific fields, then extension data.
fn single_part(input: &[u8], depth: usize) -> IResult<&[u8], BodyStructure> {
    let (rest, (media_type, _, subtype)) =
        tuple((string_utf8, sp1, string_utf8))(input)?;
    let (rest, _) = sp1(rest)?;
    let (rest, parameters) = param_list(rest)?;
    let (rest, _) = sp1(rest)?;
    let (rest, id) = nstring_utf8(rest)?;
    let (rest, _) = sp1(rest)?;
    let (rest, description) = nstring_utf8(rest)?;
    let (rest, _) = sp1(rest)?;
    let (rest, encoding) = string_utf8(rest)?;
    let (rest, _) = sp1(rest)?;
    let (rest, size) = number(rest)?;

    let is_message = media_type.eq_ignore_ascii_case("message")
        && subtype.eq_ignore_ascii_case("rfc822");
    let (rest, message, lines) = if is_message {
        let (rest, nested) = opt(preceded(
            sp1,
            tuple((envelope, sp1, |i| body(i, depth - 1), sp1, number)),
        ))(rest)?;
        match nested {
            Some((env, _, nested_body, _, nested_lines)) => (
                rest,
                Some(Box::new(MessageBody {
                    envelope: env,
                    body: nested_body,
                    lines: nested_lines,
                })),
                None,
            ),
            None => (rest, None, None),
        }
    } else if media_type.eq_ignore_ascii_case("text") {
        let (rest, lines) = opt(preceded(sp1, number))(rest)?;
        (rest, None, lines)
    } else {
        (rest, None, None)
    };

    // body-ext-1part: md5 then the shared tail; truncation at any
    // point is fine.
    let (rest, md5) = opt(preceded(sp1, nstring_utf8))(rest)?;
    let (rest, extension) = if let Some(md5) = md5 {
        let (rest, (disposition, language, location)) = extension_tail(rest)?;
        (
            rest,
            Some(PartExtension {
                md5,
                disposition,
                language,
                location,
            }),
        )
    } else {
        (rest, None)
    };

    Ok((
        rest,
        BodyStructure::Single {
            media_type,
            subtype,
            parameters,
            id,
            description,
            encoding,
            size,
            lines,
            message,
            extension,
        },
    ))
}

// ----- BODY[<section>] -----

fn header_list(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    parenthesized_list(super::core::astring_utf8)(input)
}

/// `section-msgtext`, longest keywords first so prefixes never win.
fn section_msgtext(input: &[u8]) -> IResult<&[u8], SectionText> {
    alt((
        map(
            preceded(
                tuple((tag_no_case(b"HEADER.FIELDS.NOT"), sp1)),
                header_list,
            ),
            SectionText::HeaderFieldsNot,
        ),
        map(
            preceded(tuple((tag_no_case(b"HEADER.FIELDS"), sp1)), header_list),
            SectionText::HeaderFields,
        ),
        map(tag_no_case(b"HEADER"), |_| SectionText::Header),
        map(tag_no_case(b"TEXT"), |_| SectionText::Text),
    ))(input)
}

fn section_text(input: &[u8]) -> IResult<&[u8], SectionText> {
    alt((
        section_msgtext,
        map(tag_no_case(b"MIME"), |_| SectionText::Mime),
    ))(input)
}

fn section_spec(input: &[u8]) -> IResult<&[u8], Section> {
    alt((
        map(section_msgtext, |text| Section {
            part: vec![],
            text: Some(text),
        }),
        map(
            tuple((
                separated_list1(tag(b"."), number),
                opt(preceded(tag(b"."), section_text)),
            )),
            |(part, text)| Section { part, text },
        ),
    ))(input)
}

/// `section = "[" [section-spec] "]"`
pub(crate) fn section(input: &[u8]) -> IResult<&[u8], Option<Section>> {
    let (rest, _) = tag(b"[")(input)?;
    let (rest, spec) = opt(section_spec)(rest)?;
    let (rest, _) = tag(b"]")(rest)?;
    Ok((rest, spec))
}

// ----- msg-att -----

fn msg_att(input: &[u8]) -> IResult<&[u8], AttributeValue> {
    alt((
        map(
            preceded(tuple((tag_no_case(b"UID"), sp1)), number),
            AttributeValue::Uid,
        ),
        map(
            preceded(tuple((tag_no_case(b"FLAGS"), sp1)), flag_list),
            AttributeValue::Flags,
        ),
        map(
            preceded(tuple((tag_no_case(b"INTERNALDATE"), sp1)), quoted_utf8),
            AttributeValue::InternalDate,
        ),
        map(
            preceded(tuple((tag_no_case(b"RFC822.SIZE"), sp1)), number),
            AttributeValue::Rfc822Size,
        ),
        map(
            preceded(tuple((tag_no_case(b"RFC822.HEADER"), sp1)), nstring),
            AttributeValue::Rfc822Header,
        ),
        map(
            preceded(tuple((tag_no_case(b"RFC822.TEXT"), sp1)), nstring),
            AttributeValue::Rfc822Text,
        ),
        map(
            preceded(tuple((tag_no_case(b"RFC822"), sp1)), nstring),
            AttributeValue::Rfc822,
        ),
        map(
            preceded(tuple((tag_no_case(b"ENVELOPE"), sp1)), envelope),
            |env| AttributeValue::Envelope(Box::new(env)),
        ),
        map(
            preceded(tuple((tag_no_case(b"BODYSTRUCTURE"), sp1)), body_structure),
            |body| AttributeValue::BodyStructure(Box::new(body)),
        ),
        body_section_att,
        map(
            preceded(tuple((tag_no_case(b"BODY"), sp1)), body_structure),
            |body| AttributeValue::Body(Box::new(body)),
        ),
    ))(input)
}

/// `"BODY" section ["<" number ">"] SP nstring`
fn body_section_att(input: &[u8]) -> IResult<&[u8], AttributeValue> {
    let (rest, _) = tag_no_case(b"BODY")(input)?;
    let (rest, section) = section(rest)?;
    let (rest, origin) = opt(nom::sequence::delimited(tag(b"<"), number, tag(b">")))(rest)?;
    let (rest, _) = sp1(rest)?;
    let (rest, data) = nstring(rest)?;
    Ok((
        rest,
        AttributeValue::BodySection {
            section,
            origin,
            data,
        },
    ))
}

/// The parenthesized attribute list of a FETCH response.
pub(crate) fn msg_att_list(input: &[u8]) -> IResult<&[u8], Vec<AttributeValue>> {
    parenthesized_list(msg_att)(input)
}
