//! Module `state`
//!
//! Defines the session states and which operations each state permits.
//! Checks here are local: a refused operation never reaches the wire.

use std::fmt;

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Greeting received, not logged in.
    Connected,
    /// Logged in, no data channel pending.
    Authenticated,
    /// Logged in with a negotiated data channel waiting for a service command.
    DataReady,
    /// A service command is in flight. A session left here by a cancelled
    /// transfer still owes the server's final reply and can only quit.
    Transferring,
}

/// Groups of operations with the same state requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Open the control connection
    Connect,
    /// USER / PASS
    Login,
    /// SYST / HELP, answered before login by most servers
    Query,
    /// CWD / PWD
    Navigate,
    /// PASV / PORT / EPSV / EPRT
    Negotiate,
    /// LIST / RETR / STOR
    Transfer,
    /// QUIT
    Quit,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Login => "log in",
            Operation::Query => "query the server",
            Operation::Navigate => "change or show directory",
            Operation::Negotiate => "negotiate a data channel",
            Operation::Transfer => "start a transfer",
            Operation::Quit => "quit",
        }
    }
}

impl SessionState {
    /// Whether `operation` may be issued from this state.
    pub fn permits(&self, operation: Operation) -> bool {
        use SessionState::*;
        match operation {
            Operation::Connect => *self == Disconnected,
            Operation::Login => *self == Connected,
            Operation::Query => matches!(self, Connected | Authenticated | DataReady),
            Operation::Navigate => matches!(self, Authenticated | DataReady),
            Operation::Negotiate => matches!(self, Authenticated | DataReady),
            Operation::Transfer => *self == DataReady,
            Operation::Quit => *self != Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self != SessionState::Disconnected
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated | SessionState::DataReady | SessionState::Transferring
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected (not logged in)",
            SessionState::Authenticated => "logged in",
            SessionState::DataReady => "data channel ready",
            SessionState::Transferring => "transferring",
        };
        write!(f, "{}", name)
    }
}
