//! UID FETCH command handler.
//!
//! This is the most complex IMAP response because it uses **counted
//! literals** to transfer message bodies. The format is:
//!
//! ```text
//! * <seq> FETCH (UID <uid> FLAGS (...) RFC822.SIZE <n>
//!   INTERNALDATE "..." ENVELOPE (...) BODY[] {<length>}
//! <exactly length bytes of raw RFC 2822 message>
//! )
//! ```
//!
//! The `{length}\r\n` literal marker tells the client: "the next
//! `length` bytes are raw data, not IMAP protocol text." After those
//! bytes the client expects the closing `)`. The ENVELOPE is derived
//! from the stored message's headers so envelope mapping can be
//! tested end-to-end.
//!
//! The fake returns the same attribute set whatever the client asked
//! for; RFC 3501 allows a server to send more than requested.

use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Expand a `SequenceSet` into concrete UIDs (singles and bounded
/// ranges; `*` endpoints are ignored by the fake).
pub fn extract_uids(seq_set: &SequenceSet) -> Vec<u32> {
    let mut uids = Vec::new();
    for seq in seq_set.0.as_ref() {
        match seq {
            Sequence::Single(SeqOrUid::Value(v)) => uids.push(v.get()),
            Sequence::Range(SeqOrUid::Value(a), SeqOrUid::Value(b)) => {
                let (lo, hi) = (a.get().min(b.get()), a.get().max(b.get()));
                uids.extend(lo..=hi);
            }
            _ => {}
        }
    }
    uids
}

/// Pull one header value out of raw RFC 2822 bytes.
fn header_value(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.eq_ignore_ascii_case(name) {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn nstring(value: Option<&str>) -> String {
    value.map_or_else(|| "NIL".to_string(), |v| format!("\"{v}\""))
}

/// A one-member address list from a bare `local@domain` header.
fn address_list(addr: Option<&str>) -> String {
    addr.and_then(|a| a.split_once('@'))
        .map_or_else(
            || "NIL".to_string(),
            |(local, domain)| format!("((NIL NIL \"{local}\" \"{domain}\"))"),
        )
}

/// Derive the ten-field ENVELOPE from the stored headers.
fn envelope_for(raw: &[u8]) -> String {
    let date = header_value(raw, "Date");
    let subject = header_value(raw, "Subject");
    let from = address_list(header_value(raw, "From").as_deref());
    let to = address_list(header_value(raw, "To").as_deref());
    let message_id = header_value(raw, "Message-ID");
    format!(
        "({} {} {from} {from} {from} {to} NIL NIL NIL {})",
        nstring(date.as_deref()),
        nstring(subject.as_deref()),
        nstring(message_id.as_deref()),
    )
}

/// Handle the UID FETCH command.
pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    for uid in extract_uids(sequence_set) {
        if let Some((idx, email)) = folder.emails.iter().enumerate().find(|(_, e)| e.uid == uid) {
            let seq = idx + 1; // 1-based sequence number
            let body_len = email.raw.len();
            let flags = if email.seen { "\\Seen" } else { "" };
            let envelope = envelope_for(&email.raw);

            let header = format!(
                "* {seq} FETCH (UID {uid} FLAGS ({flags}) RFC822.SIZE {body_len} \
                 INTERNALDATE \"01-Jan-2024 12:00:00 +0000\" ENVELOPE {envelope} \
                 BODY[] {{{body_len}}}\r\n"
            );
            if write_line(stream, &header).await.is_err() {
                return;
            }
            if write_bytes(stream, &email.raw).await.is_err() {
                return;
            }
            if write_line(stream, ")\r\n").await.is_err() {
                return;
            }
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use std::num::NonZeroU32;
    use tokio::io::BufReader;

    fn make_raw_email() -> Vec<u8> {
        b"From: a@b.com\r\nSubject: Test\r\n\r\nBody".to_vec()
    }

    fn uid_set(uid: u32) -> SequenceSet {
        SequenceSet(
            vec![Sequence::Single(SeqOrUid::Value(
                NonZeroU32::new(uid).unwrap(),
            ))]
            .try_into()
            .unwrap(),
        )
    }

    async fn run(
        tag: &str,
        sequence_set: &SequenceSet,
        mailbox: &Mailbox,
        selected: Option<&str>,
    ) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_uid_fetch(tag, sequence_set, mailbox, selected, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn fetches_email_by_uid() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(42, false, &raw)
            .build();

        let output = run("A1", &uid_set(42), &mailbox, Some("INBOX")).await;

        // Sequence number is 1 (1st message), UID is 42
        assert!(output.contains("* 1 FETCH (UID 42 FLAGS ()"));
        assert!(output.contains("From: a@b.com"));
        assert!(output.contains("A1 OK FETCH completed"));
    }

    #[tokio::test]
    async fn literal_length_matches_body() {
        let raw = make_raw_email();
        let expected_len = raw.len();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, false, &raw)
            .build();

        let output = run("A1", &uid_set(1), &mailbox, Some("INBOX")).await;

        let literal = format!("{{{expected_len}}}");
        assert!(output.contains(&literal));
    }

    #[tokio::test]
    async fn envelope_is_derived_from_headers() {
        let raw = b"From: alice@example.com\r\nTo: bob@example.com\r\nSubject: Hi\r\nDate: Mon, 01 Jan 2024 12:00:00 +0000\r\n\r\nx".to_vec();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, &raw)
            .build();

        let output = run("A1", &uid_set(1), &mailbox, Some("INBOX")).await;

        assert!(output.contains("ENVELOPE (\"Mon, 01 Jan 2024 12:00:00 +0000\" \"Hi\""));
        assert!(output.contains("((NIL NIL \"alice\" \"example.com\"))"));
        assert!(output.contains("((NIL NIL \"bob\" \"example.com\"))"));
    }

    #[tokio::test]
    async fn missing_uid_returns_only_ok() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run("A1", &uid_set(99), &mailbox, Some("INBOX")).await;

        assert!(!output.contains("FETCH (UID"));
        assert!(output.contains("A1 OK FETCH completed"));
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run("A1", &uid_set(1), &mailbox, None).await;

        assert!(output.contains("A1 BAD No folder selected"));
    }

    #[test]
    fn extract_uids_expands_ranges() {
        let set = SequenceSet(
            vec![
                Sequence::Single(SeqOrUid::Value(NonZeroU32::new(9).unwrap())),
                Sequence::Range(
                    SeqOrUid::Value(NonZeroU32::new(2).unwrap()),
                    SeqOrUid::Value(NonZeroU32::new(4).unwrap()),
                ),
            ]
            .try_into()
            .unwrap(),
        );
        assert_eq!(extract_uids(&set), vec![9, 2, 3, 4]);
    }
}
