//! Module `data_channel`
//!
//! The per-transfer data connection. Passive modes hand back a connected
//! stream; active modes hand back a bound listener that becomes a stream
//! once the server connects to it.

use log::{debug, info, warn};
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::{FtpClientError, FtpResult};
use crate::transfer::address::Endpoint;

/// A data connection used for exactly one LIST/RETR/STOR.
#[derive(Debug)]
pub enum DataChannel {
    /// Passive modes: the client has already connected to the server.
    Connected { stream: TcpStream, endpoint: Endpoint },
    /// Active modes: waiting for the server to connect to this listener.
    Listening {
        listener: TcpListener,
        endpoint: Endpoint,
    },
}

impl DataChannel {
    /// The endpoint negotiated for this channel.
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            DataChannel::Connected { endpoint, .. } | DataChannel::Listening { endpoint, .. } => {
                endpoint
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, DataChannel::Listening { .. })
    }

    /// Returns the stream, accepting the server's connection first in active modes.
    ///
    /// The accept is bounded by `accept_timeout`. When `expected_peer` is set,
    /// a connection from any other address is refused.
    pub async fn into_stream(
        self,
        accept_timeout: Duration,
        expected_peer: Option<IpAddr>,
    ) -> FtpResult<TcpStream> {
        let (listener, endpoint) = match self {
            DataChannel::Connected { stream, .. } => return Ok(stream),
            DataChannel::Listening { listener, endpoint } => (listener, endpoint),
        };

        let local = listener
            .local_addr()
            .map_err(|e| FtpClientError::connect_failed(&endpoint, e))?;
        debug!("Waiting for server data connection on {}", local);

        let (stream, peer) = match timeout(accept_timeout, listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(FtpClientError::connect_failed(&endpoint, e)),
            Err(_) => {
                warn!("No data connection on {} within {:?}", local, accept_timeout);
                return Err(FtpClientError::data_timeout(local));
            }
        };

        if let Some(expected) = expected_peer {
            if peer.ip() != expected {
                warn!(
                    "Rejected data connection from {} (expected {})",
                    peer, expected
                );
                return Err(FtpClientError::connect_failed(
                    &endpoint,
                    io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("unexpected data connection from {}", peer),
                    ),
                ));
            }
        }

        info!("Data connection accepted from {} on {}", peer, local);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connected_channel_returns_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();

        let channel = DataChannel::Connected {
            stream,
            endpoint: Endpoint::from(addr),
        };
        assert!(!channel.is_listening());
        assert_eq!(channel.endpoint().port, addr.port());
        assert!(channel.into_stream(Duration::from_millis(10), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_listening_channel_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let channel = DataChannel::Listening {
            listener,
            endpoint: Endpoint::from(addr),
        };

        let connector = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let expected = Some("127.0.0.1".parse().unwrap());
        let stream = channel.into_stream(Duration::from_secs(5), expected).await;
        assert!(stream.is_ok());
        connector.await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_is_time_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let channel = DataChannel::Listening {
            listener,
            endpoint: Endpoint::from(addr),
        };

        let result = channel.into_stream(Duration::from_millis(100), None).await;
        assert!(matches!(
            result,
            Err(FtpClientError::NegotiationFailed { reply: None, .. })
        ));
    }
}
