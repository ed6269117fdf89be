//! Wire-level IMAP4rev1 grammar
//!
//! Everything that touches raw protocol bytes lives here:
//!
//! - `core` -- the lexical surface (atoms, numbers, quoted strings,
//!   literals, NIL, parenthesized lists)
//! - `types` -- typed server responses
//! - `response` -- the response grammar (status, untagged data,
//!   continuation requests)
//! - `fetch` -- FETCH attributes, ENVELOPE, and BODYSTRUCTURE
//! - `command` -- typed client commands and their wire encoding
//! - `search` -- SEARCH criteria and sequence sets
//!
//! Parsers are nom *streaming* parsers: fed an incomplete buffer they
//! return `Incomplete` rather than failing, so the caller can retry
//! after more bytes arrive.

pub(crate) mod core;
pub(crate) mod fetch;
pub(crate) mod response;

pub mod command;
pub mod search;
pub mod types;
