//! Write side of the fake IMAP server.
//!
//! Replies are flushed the moment they are written. The client under
//! test interleaves its reads with the `+` continuation handshake in
//! `server.rs`, so a tagged completion parked in a write buffer would
//! stall the whole session rather than just slow it down.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Send raw octets -- a literal payload, or an already formatted
/// line -- and flush.
pub async fn write_bytes<S>(stream: &mut BufReader<S>, data: &[u8]) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let inner = stream.get_mut();
    inner.write_all(data).await?;
    inner.flush().await
}

/// Send one CRLF-terminated protocol line.
pub async fn write_line<S>(stream: &mut BufReader<S>, line: &str) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_bytes(stream, line.as_bytes()).await
}

/// Send the tagged completion that ends a command:
/// `write_tagged(s, "A1", "OK FETCH completed")` emits
/// `A1 OK FETCH completed\r\n`.
pub async fn write_tagged<S>(
    stream: &mut BufReader<S>,
    tag: &str,
    completion: &str,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_bytes(stream, format!("{tag} {completion}\r\n").as_bytes()).await
}
