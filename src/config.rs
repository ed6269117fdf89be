//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::time::Duration;

/// Default IMAPS port.
const DEFAULT_PORT: u16 = 993;
/// Largest literal the engine will accept from a server (25 MiB).
const DEFAULT_MAX_LITERAL: usize = 25 * 1024 * 1024;

/// How TLS is negotiated on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Negotiate TLS before any IMAP bytes are exchanged (port 993).
    Required,
    /// Connect in plaintext, read the greeting, then upgrade via the
    /// STARTTLS command.
    StartTls,
    /// No TLS at all. Only sensible for localhost bridges and tests.
    Disabled,
}

/// Credentials and SASL mechanism used by [`crate::ImapClient::login`].
#[derive(Clone)]
pub enum AuthMethod {
    /// The LOGIN command with username and password.
    Login { username: String, password: String },
    /// AUTHENTICATE PLAIN (RFC 4616).
    Plain { username: String, password: String },
    /// AUTHENTICATE XOAUTH2 with an opaque bearer token.
    XOAuth2 {
        username: String,
        access_token: String,
    },
    /// AUTHENTICATE EXTERNAL (identity taken from the TLS layer).
    External,
}

/// Secrets never appear in logs or debug output.
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Plain { username, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::XOAuth2 { username, .. } => f
                .debug_struct("XOAuth2")
                .field("username", username)
                .field("access_token", &"<redacted>")
                .finish(),
            Self::External => f.write_str("External"),
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub auth: AuthMethod,
    /// Deadline from the start of `connect()` to the server greeting.
    pub connect_timeout: Duration,
    /// Deadline from the start of `execute()` to the tagged response.
    pub command_timeout: Duration,
    /// Servers announcing a literal larger than this are treated as a
    /// protocol error and the connection is closed.
    pub max_literal_octets: usize,
    /// Accept any server certificate. Required for bridges with
    /// self-signed certificates; leave off for real servers.
    pub danger_accept_invalid_certs: bool,
}

impl ImapConfig {
    /// Configuration with the conservative defaults: implicit TLS on
    /// port 993, certificate verification on, 30 s connect and 60 s
    /// command deadlines.
    #[must_use]
    pub fn new(host: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            tls: TlsMode::Required,
            auth,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            max_literal_octets: DEFAULT_MAX_LITERAL,
            danger_accept_invalid_certs: false,
        }
    }

    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `993`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let username = env::var("IMAP_USERNAME")
            .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?;
        let password = env::var("IMAP_PASSWORD")
            .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?;

        let mut config = Self::new(
            env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            AuthMethod::Login { username, password },
        );
        config.port = env::var("IMAP_PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?;
        Ok(config)
    }
}
