//! Consumer-facing models mapped from wire responses
//!
//! The parser deals in octets and NIL; this module turns that into
//! something a mail application wants: decoded mailbox names, typed
//! flags, chrono dates (best-effort, raw string kept), RFC 2047
//! decoded subjects and display names, and envelope address lists
//! with their group structure intact.

use crate::connection::CommandOutcome;
use crate::flag::Flag;
use crate::mutf7;
use crate::proto::types::{
    self, AttributeValue, ListEntry, ResponseCode, Section, StatusItem, UntaggedResponse,
};
use crate::rfc2047;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

pub use crate::proto::types::BodyStructure;

/// A LIST/LSUB mailbox attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MailboxAttribute {
    NoInferiors,
    NoSelect,
    Marked,
    Unmarked,
    /// Anything else the server sent, verbatim.
    Other(String),
}

impl MailboxAttribute {
    fn from_wire(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("\\Noinferiors") {
            Self::NoInferiors
        } else if raw.eq_ignore_ascii_case("\\Noselect") {
            Self::NoSelect
        } else if raw.eq_ignore_ascii_case("\\Marked") {
            Self::Marked
        } else if raw.eq_ignore_ascii_case("\\Unmarked") {
            Self::Unmarked
        } else {
            Self::Other(raw.to_string())
        }
    }
}

/// One mailbox from a LIST or LSUB response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    /// Unicode name (modified UTF-7 decoded; raw when undecodable).
    pub name: String,
    pub delimiter: Option<String>,
    pub attributes: Vec<MailboxAttribute>,
}

impl Mailbox {
    pub(crate) fn from_wire(entry: &ListEntry) -> Self {
        let name = mutf7::decode(&entry.name).unwrap_or_else(|_| entry.name.clone());
        Self {
            name,
            delimiter: entry.delimiter.clone(),
            attributes: entry
                .attributes
                .iter()
                .map(|raw| MailboxAttribute::from_wire(raw))
                .collect(),
        }
    }
}

/// Counters from a STATUS response. Missing counts are zero; missing
/// UID values stay unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MailboxStatus {
    pub messages: u32,
    pub recent: u32,
    pub unseen: u32,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
}

impl MailboxStatus {
    pub(crate) fn from_items(items: &[StatusItem]) -> Self {
        let mut status = Self::default();
        for item in items {
            match item {
                StatusItem::Messages(n) => status.messages = *n,
                StatusItem::Recent(n) => status.recent = *n,
                StatusItem::Unseen(n) => status.unseen = *n,
                StatusItem::UidNext(n) => status.uid_next = Some(*n),
                StatusItem::UidValidity(n) => status.uid_validity = Some(*n),
            }
        }
        status
    }
}

/// What SELECT/EXAMINE reported about the now-selected mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedMailbox {
    pub name: String,
    pub read_only: bool,
    pub exists: u32,
    pub recent: u32,
    pub flags: Vec<Flag>,
    pub permanent_flags: Vec<String>,
    /// Sequence number of the first unseen message.
    pub unseen: Option<u32>,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
}

impl SelectedMailbox {
    pub(crate) fn from_outcome(name: String, read_only: bool, outcome: &CommandOutcome) -> Self {
        let mut selected = Self {
            name,
            read_only: match outcome.code {
                Some(ResponseCode::ReadOnly) => true,
                Some(ResponseCode::ReadWrite) => false,
                _ => read_only,
            },
            exists: 0,
            recent: 0,
            flags: Vec::new(),
            permanent_flags: Vec::new(),
            unseen: None,
            uid_next: None,
            uid_validity: None,
        };
        for data in &outcome.untagged {
            match data {
                UntaggedResponse::Exists(n) => selected.exists = *n,
                UntaggedResponse::Recent(n) => selected.recent = *n,
                UntaggedResponse::Flags(flags) => {
                    selected.flags = flags.iter().map(|f| Flag::from_wire(f)).collect();
                }
                UntaggedResponse::Condition {
                    code: Some(code), ..
                } => match code {
                    ResponseCode::PermanentFlags(flags) => {
                        selected.permanent_flags = flags.clone();
                    }
                    ResponseCode::Unseen(n) => selected.unseen = Some(*n),
                    ResponseCode::UidNext(n) => selected.uid_next = Some(*n),
                    ResponseCode::UidValidity(n) => selected.uid_validity = Some(*n),
                    _ => {}
                },
                _ => {}
            }
        }
        selected
    }
}

/// One envelope address. Group membership is preserved: members of
/// `group-name: a, b;` carry `group: Some("group-name")`, and the
/// open/close sentinels themselves never surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    /// Display name, RFC 2047 decoded.
    pub name: Option<String>,
    /// Source route (`adl`); rarely seen in the wild.
    pub route: Option<String>,
    pub mailbox: Option<String>,
    pub host: Option<String>,
    pub group: Option<String>,
}

impl Address {
    /// `mailbox@host` when both halves exist.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(mailbox), Some(host)) => Some(format!("{mailbox}@{host}")),
            _ => None,
        }
    }
}

/// A message envelope with decoded fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Envelope {
    /// Parsed date; `None` when the raw header defeats parsing.
    pub date: Option<DateTime<FixedOffset>>,
    /// The raw `Date:` value as the server sent it.
    pub date_raw: Option<String>,
    /// Subject, RFC 2047 decoded. `Some("")` is an empty subject,
    /// `None` a missing one.
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

impl Envelope {
    pub(crate) fn from_wire(wire: &types::Envelope) -> Self {
        let date_raw = wire.date.as_deref().map(lossy);
        Self {
            date: date_raw.as_deref().and_then(parse_rfc2822_date),
            date_raw,
            subject: wire
                .subject
                .as_deref()
                .map(|bytes| rfc2047::decode(&lossy(bytes))),
            from: map_addresses(wire.from.as_deref()),
            sender: map_addresses(wire.sender.as_deref()),
            reply_to: map_addresses(wire.reply_to.as_deref()),
            to: map_addresses(wire.to.as_deref()),
            cc: map_addresses(wire.cc.as_deref()),
            bcc: map_addresses(wire.bcc.as_deref()),
            in_reply_to: wire.in_reply_to.as_deref().map(lossy),
            message_id: wire.message_id.as_deref().map(lossy),
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Best-effort RFC 5322 date parsing; tolerates an obsolete trailing
/// comment like `(PDT)`.
fn parse_rfc2822_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date);
    }
    let without_comment = trimmed
        .rfind('(')
        .map_or(trimmed, |open| trimmed[..open].trim_end());
    DateTime::parse_from_rfc2822(without_comment).ok()
}

/// Group algebra of RFC 3501 section 7.4.2: an address with a
/// mailbox but no host opens a group, one with neither closes it.
fn map_addresses(wire: Option<&[types::Address]>) -> Vec<Address> {
    let mut out = Vec::new();
    let mut group: Option<String> = None;
    for address in wire.into_iter().flatten() {
        match (&address.mailbox, &address.host) {
            (Some(name), None) => group = Some(lossy(name)),
            (None, None) => group = None,
            _ => out.push(Address {
                name: address
                    .name
                    .as_deref()
                    .map(|bytes| rfc2047::decode(&lossy(bytes))),
                route: address.adl.as_deref().map(lossy),
                mailbox: address.mailbox.as_deref().map(lossy),
                host: address.host.as_deref().map(lossy),
                group: group.clone(),
            }),
        }
    }
    out
}

/// Octets of one `BODY[<section>]` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySectionData {
    pub section: Option<Section>,
    pub origin: Option<u32>,
    pub data: Vec<u8>,
}

/// Everything a FETCH response said about one message.
///
/// Attributes arrive in any order and none is mandatory; missing ones
/// stay `None`/empty. Body sections accumulate -- nothing is merged
/// away.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageSummary {
    /// Message sequence number of the FETCH response.
    pub seq: u32,
    pub uid: Option<u32>,
    pub flags: Vec<Flag>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub internal_date_raw: Option<String>,
    pub size: Option<u32>,
    pub envelope: Option<Envelope>,
    pub body_structure: Option<BodyStructure>,
    /// `RFC822` -- the complete raw message.
    pub rfc822: Option<Vec<u8>>,
    /// `RFC822.HEADER`.
    pub header: Option<Vec<u8>>,
    /// `RFC822.TEXT`.
    pub text: Option<Vec<u8>>,
    pub sections: Vec<BodySectionData>,
}

impl MessageSummary {
    pub(crate) fn from_attributes(seq: u32, attributes: Vec<AttributeValue>) -> Self {
        let mut summary = Self {
            seq,
            ..Self::default()
        };
        for attribute in attributes {
            match attribute {
                AttributeValue::Uid(uid) => summary.uid = Some(uid),
                AttributeValue::Flags(flags) => {
                    summary.flags = flags.iter().map(|f| Flag::from_wire(f)).collect();
                }
                AttributeValue::InternalDate(raw) => {
                    summary.internal_date = parse_internal_date(&raw);
                    summary.internal_date_raw = Some(raw);
                }
                AttributeValue::Rfc822Size(size) => summary.size = Some(size),
                AttributeValue::Rfc822(data) => summary.rfc822 = data,
                AttributeValue::Rfc822Header(data) => summary.header = data,
                AttributeValue::Rfc822Text(data) => summary.text = data,
                AttributeValue::Envelope(envelope) => {
                    summary.envelope = Some(Envelope::from_wire(&envelope));
                }
                AttributeValue::Body(body) | AttributeValue::BodyStructure(body) => {
                    summary.body_structure = Some(*body);
                }
                AttributeValue::BodySection {
                    section,
                    origin,
                    data,
                } => {
                    if let Some(data) = data {
                        summary.sections.push(BodySectionData {
                            section,
                            origin,
                            data,
                        });
                    }
                }
            }
        }
        summary
    }

    /// The full message body: `BODY[]` if fetched, else `RFC822`.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|s| s.section.is_none())
            .map(|s| s.data.as_slice())
            .or(self.rfc822.as_deref())
    }

    /// Octets of a specific fetched section.
    #[must_use]
    pub fn section(&self, section: &Section) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|s| s.section.as_ref() == Some(section))
            .map(|s| s.data.as_slice())
    }
}

/// `INTERNALDATE` format: `dd-MMM-yyyy HH:MM:SS +ZZZZ` with a
/// space-padded single-digit day.
fn parse_internal_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}
