//! Fake IMAP server for integration testing
//!
//! This module provides an in-process IMAP server that speaks enough
//! of the protocol to test `ImapClient` end-to-end, in any of three
//! security modes:
//!
//! - `Security::Plain` -- plaintext from the first byte
//! - `Security::StartTls` -- greeting, STARTTLS, TLS handshake
//! - `Security::Implicit` -- TLS before the greeting (IMAPS)
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and the command loop
//!   (including the `+` continuation handshake for client literals)
//! - `handlers/` -- one file per IMAP command (LIST, SELECT, etc.)
//! - `mailbox` -- test data model (folders, emails, builder)
//! - `io` -- shared write helpers

mod io;
pub mod mailbox;

pub use mailbox::MailboxBuilder;
pub use server::{FakeImapServer, Security};
