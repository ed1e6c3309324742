//! Transfer result types
//!
//! Defines result structures returned by the transfer engine and the session.

use std::fmt;

use crate::protocol::Reply;

/// How the byte exchange on a data channel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The server closed its end of the data connection.
    PeerClosed,
    /// The idle limit of consecutive empty reads was reached with the connection still open.
    Idle,
    /// The local source was exhausted and the data connection was closed.
    SourceExhausted,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::PeerClosed => write!(f, "peer closed"),
            Completion::Idle => write!(f, "idle"),
            Completion::SourceExhausted => write!(f, "source exhausted"),
        }
    }
}

/// Result of one engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub bytes: u64,
    pub completion: Completion,
}

/// Result of a completed LIST/RETR/STOR, including the final 226 reply
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub bytes: u64,
    pub completion: Completion,
    pub reply: Reply,
}
