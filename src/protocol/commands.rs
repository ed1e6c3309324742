//! Module `commands`
//!
//! Defines the FTP commands the client sends over the control channel.

use std::fmt;

/// Represents an FTP command to be sent to the server.
///
/// Each variant corresponds to one wire command. Commands that take
/// arguments store them as `String` variants; optional arguments use `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Cwd(String),
    Quit,
    Pasv,
    Port(String),         // h1,h2,h3,h4,p1,p2
    Epsv(Option<u8>),     // optional network protocol
    Eprt(String),         // |proto|host|port|
    Retr(String),
    Stor(String),
    List(Option<String>),
    Pwd,
    Syst,
    Help(Option<String>),
}

impl Command {
    /// The command verb as sent on the wire.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::User(_) => "USER",
            Command::Pass(_) => "PASS",
            Command::Cwd(_) => "CWD",
            Command::Quit => "QUIT",
            Command::Pasv => "PASV",
            Command::Port(_) => "PORT",
            Command::Epsv(_) => "EPSV",
            Command::Eprt(_) => "EPRT",
            Command::Retr(_) => "RETR",
            Command::Stor(_) => "STOR",
            Command::List(_) => "LIST",
            Command::Pwd => "PWD",
            Command::Syst => "SYST",
            Command::Help(_) => "HELP",
        }
    }

    /// Renders the command for logs and transcripts, hiding the password.
    pub fn masked(&self) -> String {
        match self {
            Command::Pass(_) => "PASS ****".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            Command::User(arg)
            | Command::Pass(arg)
            | Command::Cwd(arg)
            | Command::Port(arg)
            | Command::Eprt(arg)
            | Command::Retr(arg)
            | Command::Stor(arg) => write!(f, "{} {}", verb, arg),
            Command::Epsv(Some(proto)) => write!(f, "{} {}", verb, proto),
            Command::List(Some(arg)) | Command::Help(Some(arg)) => write!(f, "{} {}", verb, arg),
            _ => write!(f, "{}", verb),
        }
    }
}
