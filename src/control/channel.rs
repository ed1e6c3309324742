//! Module `channel`
//!
//! Owns the control connection to the FTP server. Commands and replies are
//! exchanged strictly in pairs: one command is written, then the client
//! waits for its complete reply before anything else is sent.

use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use crate::control::transcript::{Direction, Transcript};
use crate::error::{FtpClientError, FtpResult, ParseError};
use crate::protocol::responses::READY;
use crate::protocol::{Command, Reply, parse_reply};

const CRLF: &str = "\r\n";
const MAX_REPLY_LINE: usize = 8192;

/// The command connection to an FTP server.
///
/// Once a read or write fails the channel is marked unusable and every
/// further call fails with `ConnectionLost`; it never reconnects on its own.
pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    reply_timeout: Duration,
    transcript: Transcript,
    usable: bool,
}

impl ControlChannel {
    /// Connects to `addr` and consumes the server greeting.
    ///
    /// Returns the channel together with the greeting reply. Nothing is sent
    /// before the greeting has been read.
    pub async fn open(
        addr: &str,
        connect_timeout: Duration,
        reply_timeout: Duration,
    ) -> FtpResult<(Self, Reply)> {
        debug!("Connecting to {}", addr);
        let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(FtpClientError::connect_failed(addr, e)),
            Err(_) => {
                return Err(FtpClientError::connect_failed(
                    addr,
                    io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                ));
            }
        };

        let local_addr = stream
            .local_addr()
            .map_err(|e| FtpClientError::connect_failed(addr, e))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| FtpClientError::connect_failed(addr, e))?;
        let (read_half, write_half) = stream.into_split();

        let mut channel = ControlChannel {
            reader: BufReader::new(read_half),
            writer: write_half,
            local_addr,
            peer_addr,
            reply_timeout: connect_timeout,
            transcript: Transcript::default(),
            usable: true,
        };

        // 120 "service ready in nnn minutes" precedes the real greeting
        let mut greeting = channel.read_reply().await?;
        while greeting.is_preliminary() {
            greeting = channel.read_reply().await?;
        }
        channel.reply_timeout = reply_timeout;

        if greeting.code != READY {
            warn!("Server {} refused session: {}", peer_addr, greeting);
            return Err(FtpClientError::Rejected(greeting));
        }

        info!("Connected to {} ({})", peer_addr, greeting);
        Ok((channel, greeting))
    }

    /// Sends one command and waits for its reply.
    pub async fn send(&mut self, command: &Command) -> FtpResult<Reply> {
        self.write_command(command).await?;
        self.read_reply().await
    }

    /// Writes a command line without waiting for the reply.
    pub async fn write_command(&mut self, command: &Command) -> FtpResult<()> {
        self.ensure_usable()?;

        let masked = command.masked();
        debug!("CC OUT: {}", masked);
        self.transcript.record(Direction::Sent, masked);

        let line = format!("{}{}", command, CRLF);
        let writer = &mut self.writer;
        let result = timeout(self.reply_timeout, async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        })
        .await;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.lost(e)),
            Err(_) => Err(self.lost(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out writing command",
            ))),
        }
    }

    /// Reads one complete reply, following multi-line continuations.
    ///
    /// Used directly for replies that arrive without a new command, such as
    /// the final status line after a data transfer.
    pub async fn read_reply(&mut self) -> FtpResult<Reply> {
        self.ensure_usable()?;

        let first = self.read_line().await?;
        let reply = match parse_reply(&first) {
            Ok(reply) => reply,
            Err(e) => {
                self.usable = false;
                warn!("Unparsable reply from {}: {}", self.peer_addr, e);
                return Err(e.into());
            }
        };

        if !reply.is_multiline_start() {
            return Ok(reply);
        }

        // Continuation lines end at "<same code><space>"
        let terminator = format!("{} ", reply.code);
        let mut text = reply.text.clone();
        loop {
            let raw = self.read_line().await?;
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(last) = line.strip_prefix(&terminator) {
                text.push('\n');
                text.push_str(last);
                break;
            }
            text.push('\n');
            text.push_str(line);
        }

        Ok(Reply::new(reply.code, text))
    }

    async fn read_line(&mut self) -> FtpResult<Vec<u8>> {
        let mut line = Vec::new();
        let reader = &mut self.reader;
        let result = timeout(self.reply_timeout, async {
            reader
                .take(MAX_REPLY_LINE as u64)
                .read_until(b'\n', &mut line)
                .await
        })
        .await;
        match result {
            Ok(Ok(0)) => Err(self.lost(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the control connection",
            ))),
            Ok(Ok(_)) if !line.ends_with(b"\n") => {
                // A partial line cannot be resynchronized with the reply stream
                self.usable = false;
                if line.len() >= MAX_REPLY_LINE {
                    warn!("Reply from {} exceeds {} bytes", self.peer_addr, MAX_REPLY_LINE);
                    Err(ParseError::TooLong(MAX_REPLY_LINE).into())
                } else {
                    Err(self.lost(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server closed the control connection mid-reply",
                    )))
                }
            }
            Ok(Ok(_)) => {
                let shown = String::from_utf8_lossy(&line);
                let shown = shown.trim_end_matches(['\r', '\n']);
                debug!("CC IN: {}", shown);
                self.transcript.record(Direction::Received, shown);
                Ok(line)
            }
            Ok(Err(e)) => Err(self.lost(e)),
            Err(_) => Err(self.lost(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out waiting for reply",
            ))),
        }
    }

    /// Records a negotiation or transfer event alongside the exchanged lines.
    pub fn record_event(&mut self, event: impl Into<String>) {
        self.transcript.record(Direction::Event, event);
    }

    /// Closes the write side; the server sees end of stream.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Control channel shutdown: {}", e);
        }
        self.usable = false;
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Local address of the control connection; active modes listen on its interface.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn ensure_usable(&self) -> FtpResult<()> {
        if self.usable {
            Ok(())
        } else {
            Err(FtpClientError::ConnectionLost(io::Error::new(
                io::ErrorKind::NotConnected,
                "control channel is closed",
            )))
        }
    }

    fn lost(&mut self, e: io::Error) -> FtpClientError {
        warn!("Control connection to {} lost: {}", self.peer_addr, e);
        self.usable = false;
        FtpClientError::ConnectionLost(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_server;

    const T: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_open_reads_greeting_first() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("SYST").await;
            conn.reply("215 UNIX Type: L8").await;
        })
        .await;

        let (mut channel, greeting) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        assert_eq!(greeting, Reply::new(220, "ready"));

        let reply = channel.send(&Command::Syst).await.unwrap();
        assert_eq!(reply.code, 215);
        assert_eq!(reply.text, "UNIX Type: L8");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_greeting() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("421 Too many connections").await;
        })
        .await;

        let result = ControlChannel::open(&addr.to_string(), T, T).await;
        assert!(matches!(result, Err(FtpClientError::Rejected(r)) if r.code == 421));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ControlChannel::open(&addr.to_string(), T, T).await;
        assert!(matches!(result, Err(FtpClientError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_multiline_reply() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("HELP").await;
            conn.reply("214-The following commands are recognized.").await;
            conn.reply(" USER PASS QUIT").await;
            conn.reply("214 Help OK.").await;
        })
        .await;

        let (mut channel, _) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        let reply = channel.send(&Command::Help(None)).await.unwrap();
        assert_eq!(reply.code, 214);
        assert_eq!(
            reply.text,
            "The following commands are recognized.\n USER PASS QUIT\nHelp OK."
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_lost_makes_channel_unusable() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("PWD").await;
        })
        .await;

        let (mut channel, _) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        let result = channel.send(&Command::Pwd).await;
        assert!(matches!(result, Err(FtpClientError::ConnectionLost(_))));
        assert!(!channel.is_usable());

        let again = channel.send(&Command::Pwd).await;
        assert!(matches!(again, Err(FtpClientError::ConnectionLost(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_overlong_reply_line_is_fatal() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("PWD").await;
            let long = format!("257 \"/{}\" is current directory", "a".repeat(9000));
            conn.reply(&long).await;
        })
        .await;

        let (mut channel, _) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        let result = channel.send(&Command::Pwd).await;
        assert!(matches!(
            result,
            Err(FtpClientError::Parse(ParseError::TooLong(MAX_REPLY_LINE)))
        ));
        assert!(!channel.is_usable());

        let again = channel.send(&Command::Syst).await;
        assert!(matches!(again, Err(FtpClientError::ConnectionLost(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_reply_is_parse_error() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("PWD").await;
            conn.reply("hello there").await;
        })
        .await;

        let (mut channel, _) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        let result = channel.send(&Command::Pwd).await;
        assert!(matches!(result, Err(FtpClientError::Parse(_))));
        assert!(!channel.is_usable());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_transcript_masks_password() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            let line = conn.expect("PASS").await;
            assert_eq!(line, "PASS secret");
            conn.reply("230 Logged in").await;
        })
        .await;

        let (mut channel, _) = ControlChannel::open(&addr.to_string(), T, T).await.unwrap();
        channel.send(&Command::Pass("secret".into())).await.unwrap();

        let sent = channel.transcript().last(Direction::Sent).unwrap();
        assert_eq!(sent.line, "PASS ****");
        let received = channel.transcript().last(Direction::Received).unwrap();
        assert_eq!(received.line, "230 Logged in");
        server.await.unwrap();
    }
}
