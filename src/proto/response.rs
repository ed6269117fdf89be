//! Response grammar: status lines, untagged data, continuations
//!
//! One parser call consumes exactly one complete logical response
//! (the frame decoder guarantees any announced literal payloads are
//! fully buffered first). Dispatch follows RFC 3501 section 7: the
//! token after `* ` decides the shape -- a status condition, typed
//! mailbox/message data, or a leading number followed by
//! EXISTS/RECENT/EXPUNGE/FETCH.

use super::core::{
    astring_utf8, atom, is_astring_char, line_end, nil, number, number64, parenthesized_list,
    quoted_utf8, sp1, text,
};
use super::fetch::msg_att_list;
use super::types::{
    Capability, ListEntry, Response, ResponseCode, ResponseStatus, StatusItem, UntaggedResponse,
};
use nom::{
    IResult,
    branch::alt,
    bytes::streaming::{tag, tag_no_case, take_while, take_while1},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};

/// Parse one complete response, trailing CRLF included.
pub(crate) fn parse_response(input: &[u8]) -> IResult<&[u8], Response> {
    alt((continuation, untagged, tagged))(input)
}

// ----- pieces -----

fn imap_tag(input: &[u8]) -> IResult<&[u8], String> {
    map(
        take_while1(|b| is_astring_char(b) && b != b'+'),
        |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned(),
    )(input)
}

fn status_word(input: &[u8]) -> IResult<&[u8], ResponseStatus> {
    alt((
        value(ResponseStatus::Ok, tag_no_case(b"OK")),
        value(ResponseStatus::No, tag_no_case(b"NO")),
        value(ResponseStatus::Bad, tag_no_case(b"BAD")),
        value(ResponseStatus::PreAuth, tag_no_case(b"PREAUTH")),
        value(ResponseStatus::Bye, tag_no_case(b"BYE")),
    ))(input)
}

/// `flag` / `flag-extension`: a backslash-prefixed system flag or a
/// plain keyword atom, kept as raw text.
pub(crate) fn flag(input: &[u8]) -> IResult<&[u8], String> {
    alt((
        map(
            recognize(pair(tag(b"\\"), take_while(super::core::is_atom_char))),
            |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned(),
        ),
        atom,
    ))(input)
}

pub(crate) fn flag_list(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    parenthesized_list(flag)(input)
}

/// `flag-perm` additionally allows `\*`.
fn flag_perm(input: &[u8]) -> IResult<&[u8], String> {
    alt((map(tag(b"\\*"), |_| "\\*".to_string()), flag))(input)
}

/// A capability token: an atom, where `=` and `+` are ordinary
/// characters (`AUTH=PLAIN`, `LITERAL+`).
fn capability(input: &[u8]) -> IResult<&[u8], Capability> {
    map(atom, |token| Capability::from_atom(&token))(input)
}

fn capability_data(input: &[u8]) -> IResult<&[u8], Vec<Capability>> {
    preceded(
        tag_no_case(b"CAPABILITY"),
        many0(preceded(sp1, capability)),
    )(input)
}

/// `resp-text = ["[" resp-text-code "]" SP] text`
fn resp_text(input: &[u8]) -> IResult<&[u8], (Option<ResponseCode>, String)> {
    map(
        tuple((
            opt(terminated(
                delimited(tag(b"["), resp_text_code, tag(b"]")),
                opt(sp1),
            )),
            opt(text),
        )),
        |(code, text)| (code, text.unwrap_or_default()),
    )(input)
}

/// The typed response codes, with an atom fallback carrying raw args.
fn resp_text_code(input: &[u8]) -> IResult<&[u8], ResponseCode> {
    alt((
        value(ResponseCode::Alert, tag_no_case(b"ALERT")),
        map(
            preceded(
                tag_no_case(b"BADCHARSET"),
                opt(preceded(sp1, parenthesized_list(astring_utf8))),
            ),
            |charsets| ResponseCode::BadCharset(charsets.unwrap_or_default()),
        ),
        map(capability_data, ResponseCode::Capability),
        value(ResponseCode::Parse, tag_no_case(b"PARSE")),
        map(
            preceded(
                tuple((tag_no_case(b"PERMANENTFLAGS"), sp1)),
                parenthesized_list(flag_perm),
            ),
            ResponseCode::PermanentFlags,
        ),
        value(ResponseCode::ReadOnly, tag_no_case(b"READ-ONLY")),
        value(ResponseCode::ReadWrite, tag_no_case(b"READ-WRITE")),
        value(ResponseCode::TryCreate, tag_no_case(b"TRYCREATE")),
        map(
            preceded(tuple((tag_no_case(b"UIDNEXT"), sp1)), number),
            ResponseCode::UidNext,
        ),
        map(
            preceded(tuple((tag_no_case(b"UIDVALIDITY"), sp1)), number),
            ResponseCode::UidValidity,
        ),
        map(
            preceded(tuple((tag_no_case(b"UNSEEN"), sp1)), number),
            ResponseCode::Unseen,
        ),
        map(
            pair(
                atom,
                opt(preceded(
                    sp1,
                    map(
                        take_while1(|b| b != b']' && b != b'\r' && b != b'\n'),
                        |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned(),
                    ),
                )),
            ),
            |(name, args)| ResponseCode::Other(name, args),
        ),
    ))(input)
}

// ----- response shapes -----

/// `continue-req = "+" [SP text] CRLF`
///
/// The text is kept raw: for AUTHENTICATE it is a base64 challenge
/// and must not be picked apart as a response code.
fn continuation(input: &[u8]) -> IResult<&[u8], Response> {
    map(
        delimited(
            pair(tag(b"+"), opt(sp1)),
            opt(text),
            line_end,
        ),
        |text| Response::Continuation {
            text: text.unwrap_or_default(),
        },
    )(input)
}

/// `response-tagged = tag SP resp-cond-state CRLF`
fn tagged(input: &[u8]) -> IResult<&[u8], Response> {
    map(
        tuple((
            imap_tag,
            sp1,
            status_word,
            opt(preceded(sp1, resp_text)),
            preceded(opt(sp1), line_end),
        )),
        |(tag, _, status, text, _)| {
            let (code, text) = text.unwrap_or_default();
            Response::Tagged {
                tag,
                status,
                code,
                text,
            }
        },
    )(input)
}

/// `response-data = "*" SP (...) CRLF`
fn untagged(input: &[u8]) -> IResult<&[u8], Response> {
    map(
        delimited(
            pair(tag(b"*"), sp1),
            alt((
                condition,
                map(capability_data, UntaggedResponse::Capability),
                list_data,
                lsub_data,
                status_data,
                search_data,
                flags_data,
                message_data,
            )),
            preceded(opt(sp1), line_end),
        ),
        Response::Untagged,
    )(input)
}

/// `resp-cond-state / resp-cond-bye / resp-cond-auth`, which also
/// covers the greeting.
fn condition(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        pair(status_word, opt(preceded(sp1, resp_text))),
        |(status, text)| {
            let (code, text) = text.unwrap_or_default();
            UntaggedResponse::Condition { status, code, text }
        },
    )(input)
}

/// Shared LIST / LSUB payload: `flag-list SP (quoted-char / nil) SP mailbox`
fn mailbox_list(input: &[u8]) -> IResult<&[u8], ListEntry> {
    map(
        tuple((
            flag_list,
            sp1,
            alt((map(quoted_utf8, Some), map(nil, |_| None))),
            sp1,
            astring_utf8,
        )),
        |(attributes, _, delimiter, _, name)| ListEntry {
            attributes,
            delimiter,
            name,
        },
    )(input)
}

fn list_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        preceded(tuple((tag_no_case(b"LIST"), sp1)), mailbox_list),
        UntaggedResponse::List,
    )(input)
}

fn lsub_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        preceded(tuple((tag_no_case(b"LSUB"), sp1)), mailbox_list),
        UntaggedResponse::Lsub,
    )(input)
}

/// One STATUS attribute-value pair. Unknown keys (CONDSTORE and
/// friends) parse and are dropped.
fn status_att(input: &[u8]) -> IResult<&[u8], Option<StatusItem>> {
    alt((
        map(
            preceded(tuple((tag_no_case(b"MESSAGES"), sp1)), number),
            |n| Some(StatusItem::Messages(n)),
        ),
        map(
            preceded(tuple((tag_no_case(b"RECENT"), sp1)), number),
            |n| Some(StatusItem::Recent(n)),
        ),
        map(
            preceded(tuple((tag_no_case(b"UIDNEXT"), sp1)), number),
            |n| Some(StatusItem::UidNext(n)),
        ),
        map(
            preceded(tuple((tag_no_case(b"UIDVALIDITY"), sp1)), number),
            |n| Some(StatusItem::UidValidity(n)),
        ),
        map(
            preceded(tuple((tag_no_case(b"UNSEEN"), sp1)), number),
            |n| Some(StatusItem::Unseen(n)),
        ),
        map(pair(atom, preceded(sp1, number64)), |_| None),
    ))(input)
}

fn status_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        tuple((
            tag_no_case(b"STATUS"),
            sp1,
            astring_utf8,
            sp1,
            parenthesized_list(status_att),
        )),
        |(_, _, mailbox, _, items)| UntaggedResponse::Status {
            mailbox,
            items: items.into_iter().flatten().collect(),
        },
    )(input)
}

fn search_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        preceded(tag_no_case(b"SEARCH"), many0(preceded(sp1, number))),
        UntaggedResponse::Search,
    )(input)
}

fn flags_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    map(
        preceded(tuple((tag_no_case(b"FLAGS"), sp1)), flag_list),
        UntaggedResponse::Flags,
    )(input)
}

/// `message-data = nz-number SP ("EXISTS" / "RECENT" / "EXPUNGE" /
/// "FETCH" SP msg-att)`
fn message_data(input: &[u8]) -> IResult<&[u8], UntaggedResponse> {
    let (rest, seq) = terminated(number, sp1)(input)?;
    alt((
        map(tag_no_case(b"EXISTS"), move |_| {
            UntaggedResponse::Exists(seq)
        }),
        map(tag_no_case(b"RECENT"), move |_| {
            UntaggedResponse::Recent(seq)
        }),
        map(tag_no_case(b"EXPUNGE"), move |_| {
            UntaggedResponse::Expunge(seq)
        }),
        map(
            preceded(tuple((tag_no_case(b"FETCH"), sp1)), msg_att_list),
            move |attributes| UntaggedResponse::Fetch { seq, attributes },
        ),
    ))(rest)
}
