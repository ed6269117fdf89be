//! Typed client commands and their wire encoding
//!
//! [`encode`] turns a [`Command`] into a fragment plan: `Line`
//! fragments end right after each synchronizing literal announcement
//! `{N}CRLF`, and every `Literal` fragment must wait for the server's
//! `+` continuation before its octets go out. A command without
//! literals encodes to a single `Line`.
//!
//! String arguments choose their own form: short clean ASCII is
//! quoted, the empty string is `""`, and anything with quote-hostile
//! bytes (or anything long) becomes a literal. Mailbox names pass
//! through modified UTF-7 first.

use super::search::{SearchCriterion, SequenceSet};
use super::types::Section;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::mutf7;
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Monotonic `Axxxx` tag allocator, one per connection.
#[derive(Debug, Default)]
pub(crate) struct TagGenerator {
    next: u32,
}

impl TagGenerator {
    pub(crate) fn next(&mut self) -> String {
        self.next += 1;
        format!("A{:04}", self.next)
    }
}

/// Which connection states may issue a command (RFC 3501 section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Any,
    NotAuthenticated,
    Authenticated,
    Selected,
}

/// The STORE operation: replace, add, or remove flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Set,
    Add,
    Remove,
}

/// Keys requested from a STATUS command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    Messages,
    Recent,
    UidNext,
    UidValidity,
    Unseen,
}

impl StatusQuery {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// One item of a FETCH request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Uid,
    Flags,
    InternalDate,
    Envelope,
    Body,
    BodyStructure,
    Rfc822,
    Rfc822Header,
    Rfc822Size,
    Rfc822Text,
    /// `BODY[<section>]` or `BODY.PEEK[<section>]`, optionally with a
    /// `<start.count>` partial range.
    BodySection {
        peek: bool,
        section: Option<Section>,
        partial: Option<(u32, u32)>,
    },
}

impl fmt::Display for FetchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uid => f.write_str("UID"),
            Self::Flags => f.write_str("FLAGS"),
            Self::InternalDate => f.write_str("INTERNALDATE"),
            Self::Envelope => f.write_str("ENVELOPE"),
            Self::Body => f.write_str("BODY"),
            Self::BodyStructure => f.write_str("BODYSTRUCTURE"),
            Self::Rfc822 => f.write_str("RFC822"),
            Self::Rfc822Header => f.write_str("RFC822.HEADER"),
            Self::Rfc822Size => f.write_str("RFC822.SIZE"),
            Self::Rfc822Text => f.write_str("RFC822.TEXT"),
            Self::BodySection {
                peek,
                section,
                partial,
            } => {
                f.write_str(if *peek { "BODY.PEEK[" } else { "BODY[" })?;
                if let Some(section) = section {
                    write!(f, "{section}")?;
                }
                f.write_str("]")?;
                if let Some((start, count)) = partial {
                    write!(f, "<{start}.{count}>")?;
                }
                Ok(())
            }
        }
    }
}

/// The FETCH item list: one of the RFC macros or explicit items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    All,
    Fast,
    Full,
    Items(Vec<FetchItem>),
}

/// A typed IMAP command. Mailbox names are Unicode here; the encoder
/// applies modified UTF-7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Capability,
    Noop,
    Logout,
    StartTls,
    Login {
        username: String,
        password: String,
    },
    Authenticate {
        mechanism: String,
    },
    Select {
        mailbox: String,
    },
    Examine {
        mailbox: String,
    },
    Create {
        mailbox: String,
    },
    Delete {
        mailbox: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Subscribe {
        mailbox: String,
    },
    Unsubscribe {
        mailbox: String,
    },
    List {
        reference: String,
        pattern: String,
    },
    Lsub {
        reference: String,
        pattern: String,
    },
    Status {
        mailbox: String,
        items: Vec<StatusQuery>,
    },
    Append {
        mailbox: String,
        flags: Vec<Flag>,
        internal_date: Option<DateTime<FixedOffset>>,
        message: Vec<u8>,
    },
    Idle,
    Check,
    Close,
    Expunge,
    /// `UID EXPUNGE` (UIDPLUS), expunging only the given UIDs.
    ExpungeUid {
        set: SequenceSet,
    },
    Search {
        criteria: SearchCriterion,
        uid: bool,
    },
    Fetch {
        set: SequenceSet,
        items: FetchItems,
        uid: bool,
    },
    Store {
        set: SequenceSet,
        action: StoreAction,
        silent: bool,
        flags: Vec<Flag>,
        uid: bool,
    },
    Copy {
        set: SequenceSet,
        mailbox: String,
        uid: bool,
    },
    Move {
        set: SequenceSet,
        mailbox: String,
        uid: bool,
    },
}

impl Command {
    /// The states this command may be issued from.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Capability | Self::Noop | Self::Logout => CommandKind::Any,
            Self::StartTls | Self::Login { .. } | Self::Authenticate { .. } => {
                CommandKind::NotAuthenticated
            }
            Self::Select { .. }
            | Self::Examine { .. }
            | Self::Create { .. }
            | Self::Delete { .. }
            | Self::Rename { .. }
            | Self::Subscribe { .. }
            | Self::Unsubscribe { .. }
            | Self::List { .. }
            | Self::Lsub { .. }
            | Self::Status { .. }
            | Self::Append { .. }
            | Self::Idle => CommandKind::Authenticated,
            Self::Check
            | Self::Close
            | Self::Expunge
            | Self::ExpungeUid { .. }
            | Self::Search { .. }
            | Self::Fetch { .. }
            | Self::Store { .. }
            | Self::Copy { .. }
            | Self::Move { .. } => CommandKind::Selected,
        }
    }

    /// The verb, for logs. Never includes arguments, so secrets
    /// cannot leak through here.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Idle => "IDLE",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::ExpungeUid { .. } => "UID EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
        }
    }
}

/// One piece of the wire plan produced by [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    /// Text to write; if another fragment follows, this ends with a
    /// `{N}CRLF` literal announcement.
    Line(Vec<u8>),
    /// Raw octets to write only after a `+` continuation.
    Literal(Vec<u8>),
}

/// Longest string that still goes quoted; beyond this the encoder
/// prefers a literal, which every server must take.
const MAX_QUOTED: usize = 64;

struct CommandBuilder {
    fragments: Vec<Fragment>,
    line: Vec<u8>,
}

impl CommandBuilder {
    fn new(tag: &str) -> Self {
        Self {
            fragments: Vec::new(),
            line: tag.as_bytes().to_vec(),
        }
    }

    fn raw(&mut self, text: &str) {
        self.line.extend_from_slice(text.as_bytes());
    }

    fn sp(&mut self) {
        self.line.push(b' ');
    }

    /// A string argument in quoted or literal form per RFC 3501
    /// section 4.3.
    fn string(&mut self, bytes: &[u8]) {
        let quotable = bytes.len() <= MAX_QUOTED
            && bytes
                .iter()
                .all(|&b| (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\');
        if quotable {
            self.line.push(b'"');
            self.line.extend_from_slice(bytes);
            self.line.push(b'"');
        } else {
            self.literal(bytes);
        }
    }

    fn literal(&mut self, bytes: &[u8]) {
        self.line
            .extend_from_slice(format!("{{{}}}\r\n", bytes.len()).as_bytes());
        self.fragments.push(Fragment::Line(std::mem::take(&mut self.line)));
        self.fragments.push(Fragment::Literal(bytes.to_vec()));
    }

    fn mailbox(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty mailbox name".to_string()));
        }
        let wire = mutf7::encode(name);
        self.string(wire.as_bytes());
        Ok(())
    }

    fn flag_list(&mut self, flags: &[Flag]) {
        self.line.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.sp();
            }
            self.raw(flag.as_imap_str());
        }
        self.line.push(b')');
    }

    fn finish(mut self) -> Vec<Fragment> {
        self.line.extend_from_slice(b"\r\n");
        self.fragments.push(Fragment::Line(self.line));
        self.fragments
    }
}

/// Serialize `command` under `tag` into its fragment plan.
pub(crate) fn encode(tag: &str, command: &Command) -> Result<Vec<Fragment>> {
    let mut b = CommandBuilder::new(tag);
    b.sp();
    match command {
        Command::Capability => b.raw("CAPABILITY"),
        Command::Noop => b.raw("NOOP"),
        Command::Logout => b.raw("LOGOUT"),
        Command::StartTls => b.raw("STARTTLS"),
        Command::Idle => b.raw("IDLE"),
        Command::Check => b.raw("CHECK"),
        Command::Close => b.raw("CLOSE"),
        Command::Expunge => b.raw("EXPUNGE"),
        Command::ExpungeUid { set } => b.raw(&format!("UID EXPUNGE {set}")),
        Command::Login { username, password } => {
            b.raw("LOGIN");
            b.sp();
            b.string(username.as_bytes());
            b.sp();
            b.string(password.as_bytes());
        }
        Command::Authenticate { mechanism } => {
            if mechanism.is_empty() {
                return Err(Error::InvalidArgument("empty SASL mechanism".to_string()));
            }
            b.raw("AUTHENTICATE");
            b.sp();
            b.raw(mechanism);
        }
        Command::Select { mailbox } => {
            b.raw("SELECT");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::Examine { mailbox } => {
            b.raw("EXAMINE");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::Create { mailbox } => {
            b.raw("CREATE");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::Delete { mailbox } => {
            b.raw("DELETE");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::Rename { from, to } => {
            b.raw("RENAME");
            b.sp();
            b.mailbox(from)?;
            b.sp();
            b.mailbox(to)?;
        }
        Command::Subscribe { mailbox } => {
            b.raw("SUBSCRIBE");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::Unsubscribe { mailbox } => {
            b.raw("UNSUBSCRIBE");
            b.sp();
            b.mailbox(mailbox)?;
        }
        Command::List { reference, pattern } => {
            b.raw("LIST");
            b.sp();
            b.string(mutf7::encode(reference).as_bytes());
            b.sp();
            b.string(mutf7::encode(pattern).as_bytes());
        }
        Command::Lsub { reference, pattern } => {
            b.raw("LSUB");
            b.sp();
            b.string(mutf7::encode(reference).as_bytes());
            b.sp();
            b.string(mutf7::encode(pattern).as_bytes());
        }
        Command::Status { mailbox, items } => {
            if items.is_empty() {
                return Err(Error::InvalidArgument(
                    "STATUS needs at least one item".to_string(),
                ));
            }
            b.raw("STATUS");
            b.sp();
            b.mailbox(mailbox)?;
            b.sp();
            let keys: Vec<&str> = items.iter().map(|item| item.as_str()).collect();
            b.raw(&format!("({})", keys.join(" ")));
        }
        Command::Append {
            mailbox,
            flags,
            internal_date,
            message,
        } => {
            b.raw("APPEND");
            b.sp();
            b.mailbox(mailbox)?;
            if !flags.is_empty() {
                b.sp();
                b.flag_list(flags);
            }
            if let Some(date) = internal_date {
                b.sp();
                b.raw(&format!("\"{}\"", date.format("%e-%b-%Y %H:%M:%S %z")));
            }
            b.sp();
            b.literal(message);
        }
        Command::Search { criteria, uid } => {
            if *uid {
                b.raw("UID ");
            }
            b.raw("SEARCH");
            b.sp();
            encode_criterion(&mut b, criteria);
        }
        Command::Fetch { set, items, uid } => {
            if *uid {
                b.raw("UID ");
            }
            b.raw(&format!("FETCH {set} "));
            match items {
                FetchItems::All => b.raw("ALL"),
                FetchItems::Fast => b.raw("FAST"),
                FetchItems::Full => b.raw("FULL"),
                FetchItems::Items(items) => {
                    if items.is_empty() {
                        return Err(Error::InvalidArgument(
                            "FETCH needs at least one item".to_string(),
                        ));
                    }
                    let rendered: Vec<String> =
                        items.iter().map(ToString::to_string).collect();
                    if rendered.len() == 1 {
                        b.raw(&rendered[0]);
                    } else {
                        b.raw(&format!("({})", rendered.join(" ")));
                    }
                }
            }
        }
        Command::Store {
            set,
            action,
            silent,
            flags,
            uid,
        } => {
            if *uid {
                b.raw("UID ");
            }
            let verb = match action {
                StoreAction::Set => "FLAGS",
                StoreAction::Add => "+FLAGS",
                StoreAction::Remove => "-FLAGS",
            };
            let suffix = if *silent { ".SILENT" } else { "" };
            b.raw(&format!("STORE {set} {verb}{suffix} "));
            b.flag_list(flags);
        }
        Command::Copy { set, mailbox, uid } => {
            if *uid {
                b.raw("UID ");
            }
            b.raw(&format!("COPY {set} "));
            b.mailbox(mailbox)?;
        }
        Command::Move { set, mailbox, uid } => {
            if *uid {
                b.raw("UID ");
            }
            b.raw(&format!("MOVE {set} "));
            b.mailbox(mailbox)?;
        }
    }
    Ok(b.finish())
}

fn encode_criterion(b: &mut CommandBuilder, criterion: &SearchCriterion) {
    use SearchCriterion as S;
    match criterion {
        S::All => b.raw("ALL"),
        S::Answered => b.raw("ANSWERED"),
        S::Deleted => b.raw("DELETED"),
        S::Draft => b.raw("DRAFT"),
        S::Flagged => b.raw("FLAGGED"),
        S::New => b.raw("NEW"),
        S::Old => b.raw("OLD"),
        S::Recent => b.raw("RECENT"),
        S::Seen => b.raw("SEEN"),
        S::Unanswered => b.raw("UNANSWERED"),
        S::Undeleted => b.raw("UNDELETED"),
        S::Undraft => b.raw("UNDRAFT"),
        S::Unflagged => b.raw("UNFLAGGED"),
        S::Unseen => b.raw("UNSEEN"),
        S::Bcc(value) => string_key(b, "BCC", value),
        S::Body(value) => string_key(b, "BODY", value),
        S::Cc(value) => string_key(b, "CC", value),
        S::From(value) => string_key(b, "FROM", value),
        S::Subject(value) => string_key(b, "SUBJECT", value),
        S::Text(value) => string_key(b, "TEXT", value),
        S::To(value) => string_key(b, "TO", value),
        S::Header(field, value) => {
            b.raw("HEADER ");
            b.string(field.as_bytes());
            b.sp();
            b.string(value.as_bytes());
        }
        S::Keyword(flag) => b.raw(&format!("KEYWORD {flag}")),
        S::Unkeyword(flag) => b.raw(&format!("UNKEYWORD {flag}")),
        S::Larger(n) => b.raw(&format!("LARGER {n}")),
        S::Smaller(n) => b.raw(&format!("SMALLER {n}")),
        S::Before(date) => date_key(b, "BEFORE", *date),
        S::On(date) => date_key(b, "ON", *date),
        S::Since(date) => date_key(b, "SINCE", *date),
        S::SentBefore(date) => date_key(b, "SENTBEFORE", *date),
        S::SentOn(date) => date_key(b, "SENTON", *date),
        S::SentSince(date) => date_key(b, "SENTSINCE", *date),
        S::Uid(set) => b.raw(&format!("UID {set}")),
        S::Sequence(set) => b.raw(&set.to_string()),
        S::Not(inner) => {
            b.raw("NOT ");
            encode_group(b, inner);
        }
        S::Or(left, right) => {
            b.raw("OR ");
            encode_group(b, left);
            b.sp();
            encode_group(b, right);
        }
        S::And(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    b.sp();
                }
                encode_criterion(b, item);
            }
        }
    }
}

/// A conjunction nested under NOT/OR must be parenthesized to stay
/// one operand.
fn encode_group(b: &mut CommandBuilder, criterion: &SearchCriterion) {
    if let SearchCriterion::And(items) = criterion {
        if items.len() != 1 {
            b.raw("(");
            encode_criterion(b, criterion);
            b.raw(")");
            return;
        }
    }
    encode_criterion(b, criterion);
}

fn string_key(b: &mut CommandBuilder, key: &str, value: &str) {
    b.raw(key);
    b.sp();
    b.string(value.as_bytes());
}

fn date_key(b: &mut CommandBuilder, key: &str, date: chrono::NaiveDate) {
    b.raw(&format!("{key} {}", SearchCriterion::format_date(date)));
}
