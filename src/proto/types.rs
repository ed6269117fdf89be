//! Typed server responses
//!
//! These are the values produced by the response parser, owned rather
//! than borrowed: the frame buffer they were parsed from is recycled
//! as soon as the response is handed to the connection actor.
//!
//! String-ish fields that may legally carry non-UTF-8 octets (message
//! headers, body sections, envelope members) are `Vec<u8>`; fields the
//! grammar restricts to ASCII are `String`. `Option` distinguishes NIL
//! (absent) from an empty string.

use std::fmt;

/// Condition of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        })
    }
}

/// A server capability as advertised in CAPABILITY data.
///
/// Extensions this engine recognizes but does not speak are carried
/// through as their own variants so callers can test for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Imap4rev1,
    StartTls,
    LoginDisabled,
    Idle,
    UidPlus,
    Move,
    LiteralPlus,
    /// An `AUTH=` mechanism.
    Auth(String),
    Other(String),
}

impl Capability {
    /// Map a capability atom to its typed form.
    #[must_use]
    pub fn from_atom(atom: &str) -> Self {
        if let Some(mechanism) = atom
            .strip_prefix("AUTH=")
            .or_else(|| atom.strip_prefix("auth="))
        {
            return Self::Auth(mechanism.to_string());
        }
        if atom.eq_ignore_ascii_case("IMAP4rev1") {
            Self::Imap4rev1
        } else if atom.eq_ignore_ascii_case("STARTTLS") {
            Self::StartTls
        } else if atom.eq_ignore_ascii_case("LOGINDISABLED") {
            Self::LoginDisabled
        } else if atom.eq_ignore_ascii_case("IDLE") {
            Self::Idle
        } else if atom.eq_ignore_ascii_case("UIDPLUS") {
            Self::UidPlus
        } else if atom.eq_ignore_ascii_case("MOVE") {
            Self::Move
        } else if atom.eq_ignore_ascii_case("LITERAL+") {
            Self::LiteralPlus
        } else {
            Self::Other(atom.to_string())
        }
    }
}

/// Bracketed response code at the front of status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    Alert,
    BadCharset(Vec<String>),
    Capability(Vec<Capability>),
    Parse,
    PermanentFlags(Vec<String>),
    ReadOnly,
    ReadWrite,
    TryCreate,
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
    /// Any code this engine does not know, kept as atom + raw args.
    Other(String, Option<String>),
}

/// One `* LIST` or `* LSUB` line. `name` is the raw wire name
/// (modified UTF-7); decoding happens in the model mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub attributes: Vec<String>,
    pub delimiter: Option<String>,
    pub name: String,
}

/// One key of a `* STATUS` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    Messages(u32),
    Recent(u32),
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
}

/// A 4-tuple address from an ENVELOPE. Group open/close sentinels
/// (RFC 3501 section 7.4.2) appear here undisturbed; the model mapper
/// consumes them structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub name: Option<Vec<u8>>,
    pub adl: Option<Vec<u8>>,
    pub mailbox: Option<Vec<u8>>,
    pub host: Option<Vec<u8>>,
}

/// The ten fixed ENVELOPE fields in RFC 3501 section 7.4.2 order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub date: Option<Vec<u8>>,
    pub subject: Option<Vec<u8>>,
    pub from: Option<Vec<Address>>,
    pub sender: Option<Vec<Address>>,
    pub reply_to: Option<Vec<Address>>,
    pub to: Option<Vec<Address>>,
    pub cc: Option<Vec<Address>>,
    pub bcc: Option<Vec<Address>>,
    pub in_reply_to: Option<Vec<u8>>,
    pub message_id: Option<Vec<u8>>,
}

/// The `message/rfc822` leaf payload: the nested message's envelope,
/// structure, and line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub envelope: Envelope,
    pub body: BodyStructure,
    pub lines: u32,
}

/// Extension fields of a single part, parsed greedily. Servers
/// truncate these freely; anything missing is `None`/empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartExtension {
    pub md5: Option<String>,
    pub disposition: Option<(String, Vec<(String, String)>)>,
    pub language: Vec<String>,
    pub location: Option<String>,
}

/// A parsed BODY / BODYSTRUCTURE tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    Single {
        media_type: String,
        subtype: String,
        /// Keys are matched case-insensitively; values keep case.
        parameters: Vec<(String, String)>,
        id: Option<String>,
        description: Option<String>,
        encoding: String,
        size: u32,
        /// Line count; present for `text/*` parts.
        lines: Option<u32>,
        /// Nested message; present for `message/rfc822` parts.
        message: Option<Box<MessageBody>>,
        extension: Option<PartExtension>,
    },
    Multi {
        parts: Vec<BodyStructure>,
        subtype: String,
        parameters: Vec<(String, String)>,
        disposition: Option<(String, Vec<(String, String)>)>,
        language: Vec<String>,
        location: Option<String>,
    },
}

impl BodyStructure {
    /// Look up a MIME parameter by case-insensitive key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        let params = match self {
            Self::Single { parameters, .. } | Self::Multi { parameters, .. } => parameters,
        };
        params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// The `<section>` inside `BODY[<section>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Section {
    /// Part-number path, e.g. `1.2.3`.
    pub part: Vec<u32>,
    pub text: Option<SectionText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionText {
    Header,
    HeaderFields(Vec<String>),
    HeaderFieldsNot(Vec<String>),
    Text,
    Mime,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.part {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        if let Some(text) = &self.text {
            if !first {
                f.write_str(".")?;
            }
            match text {
                SectionText::Header => f.write_str("HEADER")?,
                SectionText::HeaderFields(fields) => {
                    write!(f, "HEADER.FIELDS ({})", fields.join(" "))?;
                }
                SectionText::HeaderFieldsNot(fields) => {
                    write!(f, "HEADER.FIELDS.NOT ({})", fields.join(" "))?;
                }
                SectionText::Text => f.write_str("TEXT")?,
                SectionText::Mime => f.write_str("MIME")?,
            }
        }
        Ok(())
    }
}

/// One attribute of a FETCH response.
///
/// A FETCH carries any number of these in any order; the parser keeps
/// them all (servers do not repeat attributes, so nothing is merged
/// or dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Uid(u32),
    Flags(Vec<String>),
    /// Raw `INTERNALDATE` string; parsed by the model mapper.
    InternalDate(String),
    Rfc822(Option<Vec<u8>>),
    Rfc822Header(Option<Vec<u8>>),
    Rfc822Size(u32),
    Rfc822Text(Option<Vec<u8>>),
    Envelope(Box<Envelope>),
    /// `BODY` without a section: the non-extensible structure.
    Body(Box<BodyStructure>),
    BodyStructure(Box<BodyStructure>),
    /// `BODY[<section>]<origin>` with its octets, verbatim.
    BodySection {
        section: Option<Section>,
        origin: Option<u32>,
        data: Option<Vec<u8>>,
    },
}

/// Untagged (`* `) server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK/NO/BAD/PREAUTH/BYE ...` -- including the greeting.
    Condition {
        status: ResponseStatus,
        code: Option<ResponseCode>,
        text: String,
    },
    Capability(Vec<Capability>),
    List(ListEntry),
    Lsub(ListEntry),
    Status {
        /// Raw wire mailbox name.
        mailbox: String,
        items: Vec<StatusItem>,
    },
    Search(Vec<u32>),
    Flags(Vec<String>),
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Fetch {
        seq: u32,
        attributes: Vec<AttributeValue>,
    },
}

/// One complete logical server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Tagged {
        tag: String,
        status: ResponseStatus,
        code: Option<ResponseCode>,
        text: String,
    },
    Untagged(UntaggedResponse),
    /// `+ ...` continuation request.
    Continuation { text: String },
}
