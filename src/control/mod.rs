//! Control connection
//!
//! Owns the command connection and its diagnostic transcript.

pub mod channel;
pub mod transcript;

pub use channel::ControlChannel;
pub use transcript::{Direction, Transcript, TranscriptEntry};
