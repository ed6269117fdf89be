#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Async IMAP4rev1 client engine
//!
//! A from-scratch RFC 3501 protocol machine: typed commands encoded
//! with synchronizing literals, a streaming response parser that
//! handles size-prefixed literals and the ENVELOPE/BODYSTRUCTURE
//! grammar, and a per-connection actor that serializes commands,
//! multiplexes untagged updates to subscribers, and drives LOGIN /
//! STARTTLS / SELECT / IDLE through their legal state transitions.
//!
//! Most applications use [`ImapClient`]; [`Connection`] is the
//! lower-level handle for raw [`proto::command::Command`] execution
//! and untagged event subscriptions.

mod client;
mod codec;
mod config;
mod connection;
mod error;
mod flag;
mod folder;
mod model;
pub mod mutf7;
pub mod proto;
mod rfc2047;

pub use client::{IdleHandle, ImapClient};
pub use config::{AuthMethod, ImapConfig, TlsMode};
pub use connection::{CommandOutcome, Connection, ConnectionState, Event};
pub use error::{Error, Result};
pub use flag::Flag;
pub use folder::Folder;
pub use model::{
    Address, BodySectionData, BodyStructure, Envelope, Mailbox, MailboxAttribute, MailboxStatus,
    MessageSummary, SelectedMailbox,
};
pub use proto::command::{Command, FetchItem, FetchItems, StatusQuery, StoreAction};
pub use proto::search::{SearchCriterion, SeqItem, SequenceSet};
pub use proto::types::{Capability, ResponseCode, Section, SectionText, UntaggedResponse};
