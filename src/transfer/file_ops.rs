//! Module `file_ops`
//!
//! Moves bytes between a data connection and a local sink or source.
//!
//! Download completion is decided from the data channel alone: end of stream
//! is the primary signal. As a fallback for servers that leave the data
//! connection open after the payload, `IDLE_READ_LIMIT` consecutive reads that
//! yield nothing within the poll interval also end the transfer. That
//! fallback is a liveness assumption about the server, not a correctness
//! guarantee: a stall longer than `IDLE_READ_LIMIT * idle_poll` mid-payload
//! truncates the download, which the final status reply should then expose.

use log::{debug, info, trace, warn};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::StreamError;
use crate::transfer::results::{Completion, StreamOutcome};

/// Consecutive empty reads after which a download is considered complete.
pub const IDLE_READ_LIMIT: u32 = 3;

/// Reads the data channel into `sink` until end of stream or until the idle
/// limit is reached, then drops the channel.
pub async fn receive<R, W>(
    mut channel: R,
    sink: &mut W,
    idle_poll: Duration,
    buffer_size: usize,
) -> Result<StreamOutcome, StreamError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes_received = 0u64;
    let mut idle_reads = 0u32;

    let completion = loop {
        match timeout(idle_poll, channel.read(&mut buffer)).await {
            Ok(Ok(0)) => break Completion::PeerClosed,
            Ok(Ok(n)) => {
                idle_reads = 0;
                sink.write_all(&buffer[..n])
                    .await
                    .map_err(|source| StreamError::Local {
                        source,
                        bytes: total_bytes_received,
                    })?;
                total_bytes_received += n as u64;
                trace!("Received {} bytes ({} total)", n, total_bytes_received);
            }
            Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
            Ok(Err(e)) => {
                warn!("Data read failed after {} bytes: {}", total_bytes_received, e);
                return Err(StreamError::Data {
                    source: e,
                    bytes: total_bytes_received,
                });
            }
            Err(_) => {
                idle_reads += 1;
                debug!("Empty read {}/{}", idle_reads, IDLE_READ_LIMIT);
                if idle_reads >= IDLE_READ_LIMIT {
                    break Completion::Idle;
                }
            }
        }
    };

    sink.flush().await.map_err(|source| StreamError::Local {
        source,
        bytes: total_bytes_received,
    })?;
    drop(channel);

    info!(
        "Download finished: {} bytes ({})",
        total_bytes_received, completion
    );
    Ok(StreamOutcome {
        bytes: total_bytes_received,
        completion,
    })
}

/// Streams `source` into the data channel in `buffer_size` chunks, then shuts
/// the channel down so the server sees end of file.
///
/// Each chunk write is bounded by `write_timeout`.
pub async fn send<R, W>(
    mut channel: W,
    source: &mut R,
    write_timeout: Duration,
    buffer_size: usize,
) -> Result<StreamOutcome, StreamError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes_sent = 0u64;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(StreamError::Local {
                    source: e,
                    bytes: total_bytes_sent,
                });
            }
        };

        match timeout(write_timeout, channel.write_all(&buffer[..n])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Data write failed after {} bytes: {}", total_bytes_sent, e);
                return Err(StreamError::Data {
                    source: e,
                    bytes: total_bytes_sent,
                });
            }
            Err(_) => {
                warn!("Data write stalled after {} bytes", total_bytes_sent);
                return Err(StreamError::Data {
                    source: ErrorKind::TimedOut.into(),
                    bytes: total_bytes_sent,
                });
            }
        }
        total_bytes_sent += n as u64;
    }

    channel
        .shutdown()
        .await
        .map_err(|source| StreamError::Data {
            source,
            bytes: total_bytes_sent,
        })?;

    info!("Upload finished: {} bytes", total_bytes_sent);
    Ok(StreamOutcome {
        bytes: total_bytes_sent,
        completion: Completion::SourceExhausted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    const POLL: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_receive_until_peer_closes() {
        let (client, mut server) = duplex(64);
        tokio::spawn(async move {
            server.write_all(b"hello ").await.unwrap();
            server.write_all(b"world").await.unwrap();
        });

        let mut sink = Vec::new();
        let outcome = receive(client, &mut sink, Duration::from_secs(5), 4)
            .await
            .unwrap();
        assert_eq!(sink, b"hello world");
        assert_eq!(outcome.bytes, 11);
        assert_eq!(outcome.completion, Completion::PeerClosed);
    }

    #[tokio::test]
    async fn test_receive_completes_after_idle_reads() {
        let (client, mut server) = duplex(64);
        server.write_all(b"hello").await.unwrap();

        let mut sink = Vec::new();
        let outcome = receive(client, &mut sink, POLL, 1024).await.unwrap();
        assert_eq!(sink, b"hello");
        assert_eq!(outcome.completion, Completion::Idle);

        // the writer side stayed open the whole time
        drop(server);
    }

    #[tokio::test]
    async fn test_data_resets_idle_counter() {
        let (client, mut server) = duplex(64);
        let writer = tokio::spawn(async move {
            for chunk in [&b"ab"[..], b"cd", b"ef"] {
                server.write_all(chunk).await.unwrap();
                // one empty poll between chunks, below the limit
                tokio::time::sleep(POLL + POLL / 2).await;
            }
            server
        });

        let mut sink = Vec::new();
        let outcome = receive(client, &mut sink, POLL, 1024).await.unwrap();
        assert_eq!(sink, b"abcdef");
        assert_eq!(outcome.completion, Completion::Idle);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_send_streams_in_chunks_and_closes() {
        let (client, mut server) = duplex(16);
        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            server.read_to_end(&mut received).await.unwrap();
            received
        });

        let payload: Vec<u8> = (0..100u8).collect();
        let mut source = &payload[..];
        let outcome = send(client, &mut source, Duration::from_secs(5), 7)
            .await
            .unwrap();
        assert_eq!(outcome.bytes, 100);
        assert_eq!(outcome.completion, Completion::SourceExhausted);
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_send_reports_data_failure() {
        let (client, server) = duplex(16);
        drop(server);

        let mut source = &b"payload"[..];
        let result = send(client, &mut source, Duration::from_secs(5), 4).await;
        assert!(matches!(result, Err(StreamError::Data { bytes: 0, .. })));
    }
}
