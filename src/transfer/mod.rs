//! Transfer module for the FTP client
//!
//! Handles address encoding, data channel negotiation, and the byte
//! exchange over a negotiated data connection.

pub mod address;
pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod operations;
pub mod results;

// Re-export key types and functions
pub use address::Endpoint;
pub use data_channel::DataChannel;
pub use file_ops::{IDLE_READ_LIMIT, receive, send};
pub use modes::TransferMode;
pub use operations::negotiate;
pub use results::{Completion, StreamOutcome, TransferSummary};
