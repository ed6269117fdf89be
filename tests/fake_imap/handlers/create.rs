//! CREATE command handler.
//!
//! Adds an empty folder under its wire name. Duplicate names get NO,
//! per RFC 3501 Section 6.3.3.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::{Folder, Mailbox};
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the CREATE command.
pub async fn handle_create<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mutex<Mailbox>,
    stream: &mut BufReader<S>,
) {
    let created = {
        let mut mailbox = mailbox.lock().unwrap();
        if mailbox.get_folder(folder_name).is_some() {
            false
        } else {
            mailbox.folders.push(Folder {
                name: folder_name.to_string(),
                emails: Vec::new(),
            });
            true
        }
    };

    let resp = if created {
        format!("{tag} OK CREATE completed\r\n")
    } else {
        format!("{tag} NO Mailbox already exists\r\n")
    };
    let _ = write_line(stream, &resp).await;
}
