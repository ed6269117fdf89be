//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .credentials("user", "pass")
//!     .folder("INBOX")
//!         .email(1, false, raw_rfc2822_bytes)
//!         .email(2, true, raw_rfc2822_bytes)
//!     .folder("Sent")
//!         .email(10, true, raw_rfc2822_bytes)
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake IMAP server via `Arc` so the
//! server knows which folders exist, what emails they contain, and
//! which flags each email carries.

/// A complete mailbox: named folders plus the accepted credentials.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
    /// When set, LOGIN/AUTHENTICATE must present exactly this pair;
    /// when `None` any credentials are accepted.
    pub credentials: Option<(String, String)>,
    /// Advertise and accept the MOVE extension (RFC 6851). Off by
    /// default so tests cover the client's COPY-based fallback.
    pub move_supported: bool,
}

impl Mailbox {
    /// Look up a folder by its wire name (case-sensitive, matching
    /// real IMAP; names are stored in their modified UTF-7 form).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }

    /// Check a login attempt against the configured credentials.
    pub fn accepts(&self, username: &str, password: &str) -> bool {
        match &self.credentials {
            Some((user, pass)) => user == username && pass == password,
            None => true,
        }
    }
}

/// A single IMAP folder (e.g. "INBOX", "Sent", "Trash").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
}

impl Folder {
    /// UID the next appended message would get.
    pub fn next_uid(&self) -> u32 {
        self.emails.iter().map(|e| e.uid).max().map_or(1, |m| m + 1)
    }
}

/// A test email stored in a folder.
///
/// - `uid`: IMAP UID -- a unique-per-folder number that never changes
///   (unlike sequence numbers which shift on delete).
/// - `seen`: whether the `\Seen` flag is set; the UNSEEN search
///   returns emails without it.
/// - `deleted`: whether `\Deleted` is set; EXPUNGE removes these.
/// - `raw`: the complete RFC 2822 message (headers + body) as bytes.
///   This is what gets returned in a FETCH BODY[] response.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub deleted: bool,
    pub raw: Vec<u8>,
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(uid, seen, raw)` calls to add messages to it.
/// Finish with `.build()` to get the final `Mailbox`.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
    credentials: Option<(String, String)>,
    move_supported: bool,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            credentials: None,
            move_supported: false,
        }
    }

    /// Require this exact username/password pair at login.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Advertise MOVE in the capability set and accept the command.
    pub fn supports_move(mut self) -> Self {
        self.move_supported = true;
        self
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(TestEmail {
                uid,
                seen,
                deleted: false,
                raw: raw.to_vec(),
            });
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
            credentials: self.credentials,
            move_supported: self.move_supported,
        }
    }
}
