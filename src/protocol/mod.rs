//! FTP Protocol implementation
//!
//! Handles command rendering, reply parsing, and reply code definitions.

pub mod commands;
pub mod parser;
pub mod responses;

pub use commands::Command;
pub use parser::parse_reply;
pub use responses::Reply;
