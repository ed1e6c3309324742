//! Error types
//!
//! Defines domain-specific error types for each layer of the FTP client.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::protocol::Reply;
use crate::session::SessionState;

/// Reply parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    TooShort(String),
    InvalidCode(String),
    MissingSeparator(String),
    /// No line terminator within the given number of bytes.
    TooLong(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "Empty reply line"),
            ParseError::TooShort(line) => write!(f, "Reply line too short: {:?}", line),
            ParseError::InvalidCode(line) => write!(f, "Invalid reply code: {:?}", line),
            ParseError::MissingSeparator(line) => {
                write!(f, "Missing separator after reply code: {:?}", line)
            }
            ParseError::TooLong(limit) => write!(f, "Reply line exceeds {} bytes", limit),
        }
    }
}

impl std::error::Error for ParseError {}

/// Address codec errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    FieldCount(usize),
    InvalidOctet(String),
    InvalidPort(String),
    MissingDelimiter(String),
    InvalidHost(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::FieldCount(n) => write!(f, "Expected 6 address fields, got {}", n),
            AddressError::InvalidOctet(s) => write!(f, "Invalid address field: {}", s),
            AddressError::InvalidPort(s) => write!(f, "Invalid port: {}", s),
            AddressError::MissingDelimiter(s) => write!(f, "Missing delimiter in: {}", s),
            AddressError::InvalidHost(s) => write!(f, "Invalid host: {}", s),
        }
    }
}

impl std::error::Error for AddressError {}

/// Transfer engine errors, split by which side of the copy failed
#[derive(Debug)]
pub enum StreamError {
    /// Reading from or writing to the data connection failed.
    Data { source: io::Error, bytes: u64 },
    /// Reading the local source or writing the local sink failed.
    Local { source: io::Error, bytes: u64 },
}

impl StreamError {
    /// Bytes moved before the failure.
    pub fn bytes(&self) -> u64 {
        match self {
            StreamError::Data { bytes, .. } | StreamError::Local { bytes, .. } => *bytes,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Data { source, bytes } => {
                write!(f, "Data connection error after {} bytes: {}", bytes, source)
            }
            StreamError::Local { source, bytes } => {
                write!(f, "Local I/O error after {} bytes: {}", bytes, source)
            }
        }
    }
}

impl std::error::Error for StreamError {}

/// General FTP client error covering every failure a session operation can report
#[derive(Debug)]
pub enum FtpClientError {
    /// Control or data connection could not be set up.
    ConnectFailed { addr: String, source: io::Error },
    /// The control connection failed mid-session.
    ConnectionLost(io::Error),
    /// The server sent a line that is not a reply.
    Parse(ParseError),
    /// Data mode setup was refused, undecodable or timed out.
    NegotiationFailed {
        reason: String,
        reply: Option<Reply>,
    },
    /// Bytes were exchanged but the final status was not 226.
    TransferFailed { reply: Reply, bytes: u64 },
    /// The operation is not allowed from the current session state.
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },
    /// A command other than a mode negotiation was refused by the server.
    Rejected(Reply),
    /// The data connection failed mid-transfer.
    DataConnectionLost(io::Error),
    /// Local source or sink failure.
    Io(io::Error),
}

impl fmt::Display for FtpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpClientError::ConnectFailed { addr, source } => {
                write!(f, "Failed to connect to {}: {}", addr, source)
            }
            FtpClientError::ConnectionLost(e) => write!(f, "Connection lost: {}", e),
            FtpClientError::Parse(e) => write!(f, "Protocol error: {}", e),
            FtpClientError::NegotiationFailed { reason, reply } => match reply {
                Some(reply) => write!(f, "Data negotiation failed: {} ({})", reason, reply),
                None => write!(f, "Data negotiation failed: {}", reason),
            },
            FtpClientError::TransferFailed { reply, bytes } => {
                write!(f, "Transfer failed after {} bytes: {}", bytes, reply)
            }
            FtpClientError::InvalidState { state, operation } => {
                write!(f, "Cannot {} while {}", operation, state)
            }
            FtpClientError::Rejected(reply) => write!(f, "Server rejected command: {}", reply),
            FtpClientError::DataConnectionLost(e) => write!(f, "Data connection lost: {}", e),
            FtpClientError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FtpClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FtpClientError::ConnectFailed { source, .. } => Some(source),
            FtpClientError::ConnectionLost(e)
            | FtpClientError::DataConnectionLost(e)
            | FtpClientError::Io(e) => Some(e),
            FtpClientError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl FtpClientError {
    pub(crate) fn connect_failed(addr: impl fmt::Display, source: io::Error) -> Self {
        FtpClientError::ConnectFailed {
            addr: addr.to_string(),
            source,
        }
    }

    pub(crate) fn negotiation(reason: impl Into<String>, reply: Option<Reply>) -> Self {
        FtpClientError::NegotiationFailed {
            reason: reason.into(),
            reply,
        }
    }

    pub(crate) fn data_timeout(addr: SocketAddr) -> Self {
        FtpClientError::negotiation(
            format!("timed out waiting for data connection on {}", addr),
            None,
        )
    }
}

impl From<ParseError> for FtpClientError {
    fn from(error: ParseError) -> Self {
        FtpClientError::Parse(error)
    }
}

impl From<AddressError> for FtpClientError {
    fn from(error: AddressError) -> Self {
        FtpClientError::negotiation(error.to_string(), None)
    }
}

impl From<StreamError> for FtpClientError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Data { source, .. } => FtpClientError::DataConnectionLost(source),
            StreamError::Local { source, .. } => FtpClientError::Io(source),
        }
    }
}

/// Result alias used throughout the client.
pub type FtpResult<T> = Result<T, FtpClientError>;
