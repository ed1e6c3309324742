//! Client session
//!
//! Sequences the control channel, negotiator and transfer engine behind a
//! single owned `Session` object.

pub mod core;
pub mod state;

pub use core::Session;
pub use state::{Operation, SessionState};
