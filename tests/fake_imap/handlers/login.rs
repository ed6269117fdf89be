//! LOGIN command handler.
//!
//! In real IMAP, credentials are sent in plaintext over the (by then
//! usually encrypted) connection. The fake checks them against the
//! mailbox's configured credentials -- which is also how tests verify
//! that a literal password survived the continuation handshake
//! byte-for-byte.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the LOGIN command. Returns false when the stream died.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    username: &str,
    password: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    let resp = if mailbox.accepts(username, password) {
        format!("{tag} OK LOGIN completed\r\n")
    } else {
        format!("{tag} NO LOGIN failed\r\n")
    };
    write_line(stream, &resp).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::BufReader;

    async fn run(mailbox: &Mailbox, username: &str, password: &str) -> String {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        handle_login("A0001", username, password, mailbox, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn accepts_anything_without_configured_credentials() {
        let mailbox = MailboxBuilder::new().build();
        let output = run(&mailbox, "whoever", "whatever").await;
        assert_eq!(output, "A0001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn checks_configured_credentials() {
        let mailbox = MailboxBuilder::new().credentials("u", "p\"q").build();
        assert!(run(&mailbox, "u", "p\"q").await.contains("OK"));
        assert!(run(&mailbox, "u", "wrong").await.contains("NO"));
    }
}
