//! Interactive shell
//!
//! Maps typed operator commands onto `Session` operations.

pub mod parser;
pub mod runner;

pub use parser::{ShellCommand, parse_line};
pub use runner::Shell;
