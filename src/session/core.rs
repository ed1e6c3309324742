//! Module `core`
//!
//! The `Session` sequences control-channel commands, data-channel
//! negotiation and transfers, and enforces the state machine in
//! `session::state` before anything is written to the wire.

use log::{debug, info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::ClientConfig;
use crate::control::{ControlChannel, Transcript};
use crate::error::handlers::is_fatal;
use crate::error::{FtpClientError, FtpResult, StreamError};
use crate::protocol::responses::{
    CLOSING_CONTROL, DATA_ALREADY_OPEN, FILE_ACTION_OK, LOGGED_IN, OPENING_DATA,
    PASSWORD_REQUIRED, PATH_CREATED, SYSTEM_TYPE, TRANSFER_COMPLETE,
};
use crate::protocol::{Command, Reply};
use crate::session::state::{Operation, SessionState};
use crate::transfer::{
    DataChannel, Endpoint, StreamOutcome, TransferMode, TransferSummary, file_ops, operations,
};

/// One client session: a control channel plus at most one pending data channel.
pub struct Session {
    config: ClientConfig,
    control: Option<ControlChannel>,
    data: Option<DataChannel>,
    state: SessionState,
    mode: Option<TransferMode>,
    greeting: Option<Reply>,
    awaiting_password: bool,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            control: None,
            data: None,
            state: SessionState::Disconnected,
            mode: None,
            greeting: None,
            awaiting_password: false,
        }
    }

    // --------------------
    // Accessors
    // --------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The greeting read when the control channel was opened.
    pub fn greeting(&self) -> Option<&Reply> {
        self.greeting.as_ref()
    }

    /// Lines exchanged on the current control channel.
    pub fn transcript(&self) -> Option<&Transcript> {
        self.control.as_ref().map(ControlChannel::transcript)
    }

    /// Mode of the pending data channel, if one has been negotiated.
    pub fn negotiated_mode(&self) -> Option<TransferMode> {
        self.mode
    }

    /// True after USER was answered with 331.
    pub fn is_awaiting_password(&self) -> bool {
        self.awaiting_password
    }

    /// Whether `operation` may be issued now.
    pub fn permits(&self, operation: Operation) -> bool {
        self.state.permits(operation)
    }

    // --------------------
    // Connection and login
    // --------------------

    /// Opens the control channel and reads the greeting.
    pub async fn connect(&mut self) -> FtpResult<Reply> {
        self.require(Operation::Connect)?;

        let (control, greeting) = ControlChannel::open(
            &self.config.control_addr(),
            self.config.connect_timeout(),
            self.config.reply_timeout(),
        )
        .await?;

        self.control = Some(control);
        self.greeting = Some(greeting.clone());
        self.state = SessionState::Connected;
        Ok(greeting)
    }

    /// USER, then PASS when the server asks for one.
    pub async fn login(&mut self, username: &str, password: &str) -> FtpResult<Reply> {
        let reply = self.user(username).await?;
        if self.state == SessionState::Authenticated {
            return Ok(reply);
        }
        self.pass(password).await
    }

    /// Sends USER. A 230 logs in directly; a 331 expects PASS next.
    pub async fn user(&mut self, username: &str) -> FtpResult<Reply> {
        self.require(Operation::Login)?;
        self.awaiting_password = false;

        let reply = self.command(&Command::User(username.to_string())).await?;
        match reply.code {
            LOGGED_IN => {
                info!("Logged in as {}", username);
                self.state = SessionState::Authenticated;
                Ok(reply)
            }
            PASSWORD_REQUIRED => {
                self.awaiting_password = true;
                Ok(reply)
            }
            _ => Err(FtpClientError::Rejected(reply)),
        }
    }

    /// Sends PASS. Only valid right after USER was answered with 331.
    pub async fn pass(&mut self, password: &str) -> FtpResult<Reply> {
        self.require(Operation::Login)?;
        if !self.awaiting_password {
            return Err(FtpClientError::InvalidState {
                state: self.state,
                operation: "send a password before USER is accepted",
            });
        }
        self.awaiting_password = false;

        let reply = self.command(&Command::Pass(password.to_string())).await?;
        if reply.code == LOGGED_IN {
            info!("Login accepted");
            self.state = SessionState::Authenticated;
            Ok(reply)
        } else {
            warn!("Login refused: {}", reply);
            Err(FtpClientError::Rejected(reply))
        }
    }

    // --------------------
    // Simple commands
    // --------------------

    pub async fn cwd(&mut self, path: &str) -> FtpResult<Reply> {
        self.require(Operation::Navigate)?;
        let reply = self.command(&Command::Cwd(path.to_string())).await?;
        expect_code(reply, FILE_ACTION_OK)
    }

    /// Returns the current directory, taken from the quoted part of the 257 reply.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        self.require(Operation::Navigate)?;
        let reply = expect_code(self.command(&Command::Pwd).await?, PATH_CREATED)?;
        Ok(reply.quoted_path().unwrap_or(reply.text))
    }

    pub async fn syst(&mut self) -> FtpResult<Reply> {
        self.require(Operation::Query)?;
        let reply = self.command(&Command::Syst).await?;
        expect_code(reply, SYSTEM_TYPE)
    }

    pub async fn help(&mut self, topic: Option<&str>) -> FtpResult<Reply> {
        self.require(Operation::Query)?;
        let reply = self
            .command(&Command::Help(topic.map(str::to_string)))
            .await?;
        if reply.is_completion() {
            Ok(reply)
        } else {
            Err(FtpClientError::Rejected(reply))
        }
    }

    /// Sends QUIT and closes the control channel.
    ///
    /// After an interrupted transfer the reply stream is out of step, so the
    /// channel is closed without QUIT and `None` is returned.
    pub async fn quit(&mut self) -> FtpResult<Option<Reply>> {
        self.require(Operation::Quit)?;
        let interrupted = self.state == SessionState::Transferring;

        let Some(mut control) = self.control.take() else {
            self.reset();
            return Ok(None);
        };
        self.reset();

        if interrupted {
            warn!("Closing control channel after interrupted transfer");
            control.shutdown().await;
            return Ok(None);
        }

        let result = control.send(&Command::Quit).await;
        control.shutdown().await;
        info!("Session closed");

        let reply = result?;
        if reply.code == CLOSING_CONTROL {
            Ok(Some(reply))
        } else {
            Err(FtpClientError::Rejected(reply))
        }
    }

    // --------------------
    // Data channel
    // --------------------

    /// Negotiates a data channel for the next LIST/RETR/STOR.
    ///
    /// Any previously negotiated channel is dropped first.
    pub async fn negotiate(&mut self, mode: TransferMode) -> FtpResult<Endpoint> {
        self.require(Operation::Negotiate)?;
        if self.data.take().is_some() {
            debug!("Dropping unused data channel before new negotiation");
        }
        self.mode = None;
        self.state = SessionState::Authenticated;

        let Some(control) = self.control.as_mut() else {
            return Err(FtpClientError::InvalidState {
                state: self.state,
                operation: Operation::Negotiate.name(),
            });
        };
        let result = operations::negotiate(mode, control, &self.config).await;
        let channel = self.observe(result)?;

        let endpoint = channel.endpoint().clone();
        self.data = Some(channel);
        self.mode = Some(mode);
        self.state = SessionState::DataReady;
        Ok(endpoint)
    }

    /// LIST over the negotiated data channel, returned as text.
    pub async fn list(&mut self, path: Option<&str>) -> FtpResult<String> {
        let mut listing = Vec::new();
        self.retrieve(Command::List(path.map(str::to_string)), &mut listing)
            .await?;
        Ok(String::from_utf8_lossy(&listing).into_owned())
    }

    /// RETR `path` into `sink`.
    pub async fn retr<W>(&mut self, path: &str, sink: &mut W) -> FtpResult<TransferSummary>
    where
        W: AsyncWrite + Unpin,
    {
        self.retrieve(Command::Retr(path.to_string()), sink).await
    }

    /// STOR `path` from `source`.
    pub async fn stor<R>(&mut self, path: &str, source: &mut R) -> FtpResult<TransferSummary>
    where
        R: AsyncRead + Unpin,
    {
        let stream = self.open_transfer(Command::Stor(path.to_string())).await?;
        let outcome = file_ops::send(
            stream,
            source,
            self.config.data_timeout(),
            self.config.buffer_size,
        )
        .await;
        self.finish_transfer(outcome).await
    }

    /// RETR `remote` into a local file.
    ///
    /// Bytes land in a `.part` sibling that replaces `local` only after a 226,
    /// so a refused or failed transfer leaves an existing file untouched.
    pub async fn download(
        &mut self,
        remote: &str,
        local: impl AsRef<Path>,
    ) -> FtpResult<TransferSummary> {
        self.require(Operation::Transfer)?;
        let local = local.as_ref();
        let partial = partial_path(local);

        let mut file = File::create(&partial)
            .await
            .map_err(FtpClientError::Io)?;
        let result = self.retr(remote, &mut file).await;
        drop(file);

        let renamed = match result {
            Ok(summary) => fs::rename(&partial, local)
                .await
                .map(|_| summary)
                .map_err(FtpClientError::Io),
            Err(e) => Err(e),
        };
        if renamed.is_err() {
            if let Err(e) = fs::remove_file(&partial).await {
                debug!("Could not remove {}: {}", partial.display(), e);
            }
        }
        renamed
    }

    /// STOR a local file as `remote`.
    pub async fn upload(
        &mut self,
        local: impl AsRef<Path>,
        remote: &str,
    ) -> FtpResult<TransferSummary> {
        self.require(Operation::Transfer)?;
        let mut file = File::open(local.as_ref())
            .await
            .map_err(FtpClientError::Io)?;
        self.stor(remote, &mut file).await
    }

    async fn retrieve<W>(&mut self, command: Command, sink: &mut W) -> FtpResult<TransferSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let stream = self.open_transfer(command).await?;
        let outcome = file_ops::receive(
            stream,
            sink,
            self.config.idle_poll(),
            self.config.buffer_size,
        )
        .await;
        self.finish_transfer(outcome).await
    }

    /// Sends the service command and returns the ready data stream.
    async fn open_transfer(&mut self, command: Command) -> FtpResult<TcpStream> {
        self.require(Operation::Transfer)?;
        let Some(channel) = self.data.take() else {
            return Err(FtpClientError::InvalidState {
                state: self.state,
                operation: Operation::Transfer.name(),
            });
        };
        self.mode = None;
        self.state = SessionState::Transferring;

        let control = self.connected_control()?;
        let result = control.send(&command).await;
        let reply = self.observe(result)?;

        if reply.code != OPENING_DATA && reply.code != DATA_ALREADY_OPEN {
            warn!("{} refused: {}", command.verb(), reply);
            self.state = SessionState::Authenticated;
            return Err(FtpClientError::Rejected(reply));
        }

        let expected_peer = self.control.as_ref().map(|c| c.peer_addr().ip());
        match channel
            .into_stream(self.config.data_timeout(), expected_peer)
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                // The server reports its side of the failed connection on the control channel
                if let Ok(reply) = self.read_final_reply().await {
                    warn!("{} data connection failed, server said: {}", command.verb(), reply);
                }
                if self.state == SessionState::Transferring {
                    self.state = SessionState::Authenticated;
                }
                Err(e)
            }
        }
    }

    /// Reads the final status line and decides the transfer's outcome.
    ///
    /// Only 226 counts as success, whatever the byte exchange reported.
    async fn finish_transfer(
        &mut self,
        outcome: Result<StreamOutcome, StreamError>,
    ) -> FtpResult<TransferSummary> {
        let reply = self.read_final_reply().await?;
        self.state = SessionState::Authenticated;

        match outcome {
            Ok(outcome) if reply.code == TRANSFER_COMPLETE => {
                info!(
                    "Transfer complete: {} bytes ({})",
                    outcome.bytes, outcome.completion
                );
                Ok(TransferSummary {
                    bytes: outcome.bytes,
                    completion: outcome.completion,
                    reply,
                })
            }
            Ok(outcome) => {
                warn!("Transfer of {} bytes ended with {}", outcome.bytes, reply);
                Err(FtpClientError::TransferFailed {
                    reply,
                    bytes: outcome.bytes,
                })
            }
            Err(StreamError::Data { source, bytes }) if reply.code == TRANSFER_COMPLETE => {
                warn!("Data connection failed after {} bytes despite {}", bytes, reply);
                Err(FtpClientError::DataConnectionLost(source))
            }
            Err(StreamError::Data { bytes, .. }) => {
                Err(FtpClientError::TransferFailed { reply, bytes })
            }
            Err(e @ StreamError::Local { .. }) => {
                warn!("Local failure ({}), server said: {}", e, reply);
                Err(e.into())
            }
        }
    }

    // --------------------
    // Internals
    // --------------------

    async fn command(&mut self, command: &Command) -> FtpResult<Reply> {
        let control = self.connected_control()?;
        let result = control.send(command).await;
        self.observe(result)
    }

    async fn read_final_reply(&mut self) -> FtpResult<Reply> {
        let control = self.connected_control()?;
        let result = control.read_reply().await;
        self.observe(result)
    }

    fn connected_control(&mut self) -> FtpResult<&mut ControlChannel> {
        let state = self.state;
        self.control
            .as_mut()
            .ok_or(FtpClientError::InvalidState {
                state,
                operation: "use the control channel",
            })
    }

    fn require(&self, operation: Operation) -> FtpResult<()> {
        if self.state.permits(operation) {
            Ok(())
        } else {
            debug!("Refusing to {} while {}", operation.name(), self.state);
            Err(FtpClientError::InvalidState {
                state: self.state,
                operation: operation.name(),
            })
        }
    }

    /// Drops the connection when `result` carries a fatal error.
    fn observe<T>(&mut self, result: FtpResult<T>) -> FtpResult<T> {
        if let Err(e) = &result {
            if is_fatal(e) {
                warn!("Session disconnected: {}", e);
                self.control = None;
                self.reset();
            }
        }
        result
    }

    fn reset(&mut self) {
        self.data = None;
        self.mode = None;
        self.awaiting_password = false;
        self.state = SessionState::Disconnected;
    }
}

/// `dir/name` becomes `dir/name.part`.
fn partial_path(local: &Path) -> PathBuf {
    let mut name = local
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    local.with_file_name(name)
}

fn expect_code(reply: Reply, expected: u16) -> FtpResult<Reply> {
    if reply.code == expected {
        Ok(reply)
    } else {
        Err(FtpClientError::Rejected(reply))
    }
}
