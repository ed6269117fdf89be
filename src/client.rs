//! High-level IMAP client
//!
//! [`ImapClient`] wraps a [`Connection`] with typed methods that send
//! one command each and map the collected untagged responses into the
//! models of [`crate::model`]. All protocol discipline (states, tags,
//! literal continuations) lives in the connection actor; this layer
//! validates arguments, picks the right command shape, and interprets
//! results.

use crate::config::{AuthMethod, ImapConfig};
use crate::connection::{CommandOutcome, Connection, ConnectionState, Event};
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::Folder;
use crate::model::{Mailbox, MailboxStatus, MessageSummary, SelectedMailbox};
use crate::proto::command::{Command, FetchItems, StatusQuery, StoreAction};
use crate::proto::search::{SearchCriterion, SequenceSet};
use crate::proto::types::{Capability, UntaggedResponse};
use chrono::{DateTime, FixedOffset};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// An authenticated-capable IMAP client over one connection.
pub struct ImapClient {
    conn: Connection,
    config: ImapConfig,
}

impl ImapClient {
    /// Connect per the configuration (TCP, TLS mode, greeting). Call
    /// [`ImapClient::login`] next unless the server pre-authenticated.
    pub async fn connect(config: ImapConfig) -> Result<Self> {
        let conn = Connection::connect(&config).await?;
        Ok(Self { conn, config })
    }

    /// The underlying connection handle, for untagged subscriptions
    /// and raw command execution.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Subscribe to untagged server events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.conn.subscribe()
    }

    /// Current protocol state.
    pub async fn state(&self) -> ConnectionState {
        self.conn.state().await
    }

    /// Authenticate using the configured method.
    pub async fn login(&self) -> Result<()> {
        match self.config.auth.clone() {
            AuthMethod::Login { username, password } => {
                self.conn
                    .execute(Command::Login { username, password })
                    .await?;
            }
            AuthMethod::Plain { username, password } => {
                let payload = plain_payload(&username, &password);
                let mut sent = false;
                self.conn
                    .authenticate("PLAIN", move |_challenge| {
                        if sent {
                            // A second challenge means the server did
                            // not accept the credentials blob.
                            Ok(Vec::new())
                        } else {
                            sent = true;
                            Ok(payload.clone())
                        }
                    })
                    .await?;
            }
            AuthMethod::XOAuth2 {
                username,
                access_token,
            } => {
                let payload = xoauth2_payload(&username, &access_token);
                let mut sent = false;
                self.conn
                    .authenticate("XOAUTH2", move |_challenge| {
                        // After the initial blob, XOAUTH2 answers any
                        // error challenge with an empty response.
                        if sent {
                            Ok(Vec::new())
                        } else {
                            sent = true;
                            Ok(payload.clone())
                        }
                    })
                    .await?;
            }
            AuthMethod::External => {
                self.conn
                    .authenticate("EXTERNAL", |_challenge| Ok(Vec::new()))
                    .await?;
            }
        }
        info!("logged in");
        Ok(())
    }

    /// Server capabilities, from cache when fresh, otherwise asked.
    pub async fn capabilities(&self) -> Result<Vec<Capability>> {
        if let Some(cached) = self.conn.cached_capabilities().await {
            return Ok(cached);
        }
        let outcome = self.conn.execute(Command::Capability).await?;
        for data in &outcome.untagged {
            if let UntaggedResponse::Capability(caps) = data {
                return Ok(caps.clone());
            }
        }
        Err(Error::Protocol(
            "CAPABILITY completed without capability data".to_string(),
        ))
    }

    pub async fn has_capability(&self, capability: &Capability) -> Result<bool> {
        Ok(self.capabilities().await?.contains(capability))
    }

    /// List mailboxes matching `pattern` under `reference`
    /// (`list("", "*")` for everything).
    pub async fn list(&self, reference: &str, pattern: &str) -> Result<Vec<Mailbox>> {
        let outcome = self
            .conn
            .execute(Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(collect_mailboxes(&outcome, false))
    }

    /// Like [`ImapClient::list`] but over the subscribed set.
    pub async fn lsub(&self, reference: &str, pattern: &str) -> Result<Vec<Mailbox>> {
        let outcome = self
            .conn
            .execute(Command::Lsub {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(collect_mailboxes(&outcome, true))
    }

    /// SELECT a mailbox read-write.
    pub async fn select(&self, folder: &Folder) -> Result<SelectedMailbox> {
        let outcome = self
            .conn
            .execute(Command::Select {
                mailbox: folder.as_str().to_string(),
            })
            .await?;
        debug!(folder = %folder, "selected");
        Ok(SelectedMailbox::from_outcome(
            folder.as_str().to_string(),
            false,
            &outcome,
        ))
    }

    /// EXAMINE: like SELECT but read-only.
    pub async fn examine(&self, folder: &Folder) -> Result<SelectedMailbox> {
        let outcome = self
            .conn
            .execute(Command::Examine {
                mailbox: folder.as_str().to_string(),
            })
            .await?;
        Ok(SelectedMailbox::from_outcome(
            folder.as_str().to_string(),
            true,
            &outcome,
        ))
    }

    pub async fn create(&self, folder: &Folder) -> Result<()> {
        self.simple(Command::Create {
            mailbox: folder.as_str().to_string(),
        })
        .await
    }

    pub async fn delete(&self, folder: &Folder) -> Result<()> {
        self.simple(Command::Delete {
            mailbox: folder.as_str().to_string(),
        })
        .await
    }

    pub async fn rename(&self, from: &Folder, to: &Folder) -> Result<()> {
        self.simple(Command::Rename {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
        .await
    }

    pub async fn subscribe_mailbox(&self, folder: &Folder) -> Result<()> {
        self.simple(Command::Subscribe {
            mailbox: folder.as_str().to_string(),
        })
        .await
    }

    pub async fn unsubscribe_mailbox(&self, folder: &Folder) -> Result<()> {
        self.simple(Command::Unsubscribe {
            mailbox: folder.as_str().to_string(),
        })
        .await
    }

    /// STATUS without selecting. Asks for all five RFC 3501 keys.
    pub async fn status(&self, folder: &Folder) -> Result<MailboxStatus> {
        let outcome = self
            .conn
            .execute(Command::Status {
                mailbox: folder.as_str().to_string(),
                items: vec![
                    StatusQuery::Messages,
                    StatusQuery::Recent,
                    StatusQuery::UidNext,
                    StatusQuery::UidValidity,
                    StatusQuery::Unseen,
                ],
            })
            .await?;
        for data in &outcome.untagged {
            if let UntaggedResponse::Status { items, .. } = data {
                return Ok(MailboxStatus::from_items(items));
            }
        }
        Err(Error::Protocol(
            "STATUS completed without status data".to_string(),
        ))
    }

    /// APPEND a complete RFC 5322 message to a mailbox.
    pub async fn append(
        &self,
        folder: &Folder,
        flags: &[Flag],
        internal_date: Option<DateTime<FixedOffset>>,
        message: &[u8],
    ) -> Result<()> {
        if message.is_empty() {
            return Err(Error::InvalidArgument("empty message".to_string()));
        }
        self.simple(Command::Append {
            mailbox: folder.as_str().to_string(),
            flags: flags.to_vec(),
            internal_date,
            message: message.to_vec(),
        })
        .await
    }

    pub async fn check(&self) -> Result<()> {
        self.simple(Command::Check).await
    }

    /// CLOSE the selected mailbox (expunges silently, back to
    /// authenticated state).
    pub async fn close(&self) -> Result<()> {
        self.simple(Command::Close).await
    }

    /// EXPUNGE; returns the expunged sequence numbers in server order.
    pub async fn expunge(&self) -> Result<Vec<u32>> {
        let outcome = self.conn.execute(Command::Expunge).await?;
        Ok(collect_expunged(&outcome))
    }

    /// `UID EXPUNGE` (requires UIDPLUS).
    pub async fn uid_expunge(&self, uids: SequenceSet) -> Result<Vec<u32>> {
        let outcome = self.conn.execute(Command::ExpungeUid { set: uids }).await?;
        Ok(collect_expunged(&outcome))
    }

    /// SEARCH by sequence numbers.
    pub async fn search(&self, criteria: SearchCriterion) -> Result<Vec<u32>> {
        self.run_search(criteria, false).await
    }

    /// UID SEARCH.
    pub async fn uid_search(&self, criteria: SearchCriterion) -> Result<Vec<u32>> {
        self.run_search(criteria, true).await
    }

    async fn run_search(&self, criteria: SearchCriterion, uid: bool) -> Result<Vec<u32>> {
        let outcome = self.conn.execute(Command::Search { criteria, uid }).await?;
        let mut ids = Vec::new();
        for data in &outcome.untagged {
            if let UntaggedResponse::Search(found) = data {
                ids.extend_from_slice(found);
            }
        }
        debug!(matches = ids.len(), "search finished");
        Ok(ids)
    }

    /// FETCH by sequence numbers.
    pub async fn fetch(
        &self,
        set: SequenceSet,
        items: FetchItems,
    ) -> Result<Vec<MessageSummary>> {
        self.run_fetch(set, items, false).await
    }

    /// UID FETCH.
    pub async fn uid_fetch(
        &self,
        set: SequenceSet,
        items: FetchItems,
    ) -> Result<Vec<MessageSummary>> {
        self.run_fetch(set, items, true).await
    }

    async fn run_fetch(
        &self,
        set: SequenceSet,
        items: FetchItems,
        uid: bool,
    ) -> Result<Vec<MessageSummary>> {
        let outcome = self.conn.execute(Command::Fetch { set, items, uid }).await?;
        Ok(collect_summaries(outcome))
    }

    /// STORE by sequence numbers; returns the updated summaries
    /// (empty with `silent`).
    pub async fn store(
        &self,
        set: SequenceSet,
        action: StoreAction,
        silent: bool,
        flags: &[Flag],
    ) -> Result<Vec<MessageSummary>> {
        self.run_store(set, action, silent, flags, false).await
    }

    /// UID STORE.
    pub async fn uid_store(
        &self,
        set: SequenceSet,
        action: StoreAction,
        silent: bool,
        flags: &[Flag],
    ) -> Result<Vec<MessageSummary>> {
        self.run_store(set, action, silent, flags, true).await
    }

    async fn run_store(
        &self,
        set: SequenceSet,
        action: StoreAction,
        silent: bool,
        flags: &[Flag],
        uid: bool,
    ) -> Result<Vec<MessageSummary>> {
        let outcome = self
            .conn
            .execute(Command::Store {
                set,
                action,
                silent,
                flags: flags.to_vec(),
                uid,
            })
            .await?;
        Ok(collect_summaries(outcome))
    }

    /// COPY by sequence numbers.
    pub async fn copy(&self, set: SequenceSet, to: &Folder) -> Result<()> {
        self.simple(Command::Copy {
            set,
            mailbox: to.as_str().to_string(),
            uid: false,
        })
        .await
    }

    /// UID COPY.
    pub async fn uid_copy(&self, set: SequenceSet, to: &Folder) -> Result<()> {
        self.simple(Command::Copy {
            set,
            mailbox: to.as_str().to_string(),
            uid: true,
        })
        .await
    }

    /// Move messages: MOVE when the server advertises it, otherwise
    /// the classic COPY + STORE `\Deleted` + EXPUNGE sequence.
    pub async fn move_messages(&self, set: SequenceSet, to: &Folder) -> Result<()> {
        self.run_move(set, to, false).await
    }

    /// UID MOVE, with the same fallback.
    pub async fn uid_move(&self, set: SequenceSet, to: &Folder) -> Result<()> {
        self.run_move(set, to, true).await
    }

    async fn run_move(&self, set: SequenceSet, to: &Folder, uid: bool) -> Result<()> {
        if self.has_capability(&Capability::Move).await? {
            return self
                .simple(Command::Move {
                    set,
                    mailbox: to.as_str().to_string(),
                    uid,
                })
                .await;
        }
        debug!("server lacks MOVE; copying then expunging");
        self.simple(Command::Copy {
            set: set.clone(),
            mailbox: to.as_str().to_string(),
            uid,
        })
        .await?;
        self.conn
            .execute(Command::Store {
                set,
                action: StoreAction::Add,
                silent: true,
                flags: vec![Flag::Deleted],
                uid,
            })
            .await?;
        self.conn.execute(Command::Expunge).await?;
        Ok(())
    }

    /// Enter IDLE. Server updates flow to subscribers until the
    /// returned handle is [`IdleHandle::done`].
    pub async fn idle(&self) -> Result<IdleHandle> {
        self.conn.start_idle().await?;
        Ok(IdleHandle {
            conn: self.conn.clone(),
        })
    }

    pub async fn noop(&self) -> Result<()> {
        self.simple(Command::Noop).await
    }

    /// LOGOUT and drop the connection.
    pub async fn logout(&self) -> Result<()> {
        self.simple(Command::Logout).await
    }

    async fn simple(&self, command: Command) -> Result<()> {
        self.conn.execute(command).await?;
        Ok(())
    }
}

/// Keeps an IDLE alive; call [`IdleHandle::done`] to resume normal
/// commands.
pub struct IdleHandle {
    conn: Connection,
}

impl IdleHandle {
    /// Send DONE and wait for the IDLE's tagged completion.
    pub async fn done(self) -> Result<CommandOutcome> {
        self.conn.stop_idle().await
    }
}

fn collect_mailboxes(outcome: &CommandOutcome, subscribed: bool) -> Vec<Mailbox> {
    outcome
        .untagged
        .iter()
        .filter_map(|data| match data {
            UntaggedResponse::List(entry) if !subscribed => Some(Mailbox::from_wire(entry)),
            UntaggedResponse::Lsub(entry) if subscribed => Some(Mailbox::from_wire(entry)),
            _ => None,
        })
        .collect()
}

fn collect_summaries(outcome: CommandOutcome) -> Vec<MessageSummary> {
    outcome
        .untagged
        .into_iter()
        .filter_map(|data| match data {
            UntaggedResponse::Fetch { seq, attributes } => {
                Some(MessageSummary::from_attributes(seq, attributes))
            }
            _ => None,
        })
        .collect()
}

fn collect_expunged(outcome: &CommandOutcome) -> Vec<u32> {
    outcome
        .untagged
        .iter()
        .filter_map(|data| match data {
            UntaggedResponse::Expunge(seq) => Some(*seq),
            _ => None,
        })
        .collect()
}

/// RFC 4616: `\0 authcid \0 password`.
fn plain_payload(username: &str, password: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(username.len() + password.len() + 2);
    payload.push(0);
    payload.extend_from_slice(username.as_bytes());
    payload.push(0);
    payload.extend_from_slice(password.as_bytes());
    payload
}

/// The XOAUTH2 initial blob:
/// `user=<user>^Aauth=Bearer <token>^A^A`.
fn xoauth2_payload(username: &str, access_token: &str) -> Vec<u8> {
    format!("user={username}\x01auth=Bearer {access_token}\x01\x01").into_bytes()
}
