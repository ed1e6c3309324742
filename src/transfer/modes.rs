//! FTP Transfer modes
//!
//! Handles the four data-connection addressing modes.

use serde::Deserialize;
use std::fmt;

/// Data connection modes. Passive modes have the client connect to the
/// server; active modes have the server connect back to a client listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    Passive,
    Active,
    ExtendedPassive,
    ExtendedActive,
}

impl TransferMode {
    /// True when the server initiates the data connection.
    pub fn is_active(&self) -> bool {
        matches!(self, TransferMode::Active | TransferMode::ExtendedActive)
    }

    /// The negotiation command verb for this mode.
    pub fn verb(&self) -> &'static str {
        match self {
            TransferMode::Passive => "PASV",
            TransferMode::Active => "PORT",
            TransferMode::ExtendedPassive => "EPSV",
            TransferMode::ExtendedActive => "EPRT",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferMode::Passive => "passive",
            TransferMode::Active => "active",
            TransferMode::ExtendedPassive => "extended passive",
            TransferMode::ExtendedActive => "extended active",
        };
        write!(f, "{}", name)
    }
}
