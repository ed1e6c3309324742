//! RAX FTP Client
//!
//! A dual-channel FTP client engine: control-channel command/reply
//! exchange, data-channel negotiation in four addressing modes, and
//! transfer completion detection, sequenced by a session state machine.

pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod session;
pub mod shell;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use error::{FtpClientError, FtpResult};
pub use protocol::Reply;
pub use session::{Session, SessionState};
pub use shell::Shell;
pub use transfer::{Endpoint, TransferMode, TransferSummary};
