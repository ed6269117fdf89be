//! NOOP command handler.
//!
//! Responds OK after a short delay. The delay gives cancellation
//! tests a window in which a command is genuinely in flight.

use crate::fake_imap::io::write_line;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the NOOP command.
pub async fn handle_noop<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let resp = format!("{tag} OK NOOP completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn responds_with_ok() {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        handle_noop("A0001", &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "A0001 OK NOOP completed\r\n");
    }
}
