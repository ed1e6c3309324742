use crate::session::Operation;
use crate::transfer::TransferMode;

// Operator commands typed at the shell prompt
#[derive(Debug, PartialEq)]
pub enum ShellCommand {
    User(String),
    Pass(String),
    Cd(String),
    Pwd,
    Ls(Option<String>),
    Get { remote: String, local: Option<String> },
    Put { local: String, remote: Option<String> },
    Mode(TransferMode),
    Syst,
    Help(Option<String>),
    Quit,
    Empty,
    MissingArgument(&'static str),
    Unknown(String),
}

impl ShellCommand {
    /// The session operation this command needs permission for.
    ///
    /// Data commands negotiate their own channel first, so they need
    /// `Negotiate` rather than `Transfer`.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ShellCommand::User(_) | ShellCommand::Pass(_) => Some(Operation::Login),
            ShellCommand::Cd(_) | ShellCommand::Pwd => Some(Operation::Navigate),
            ShellCommand::Ls(_) | ShellCommand::Get { .. } | ShellCommand::Put { .. } => {
                Some(Operation::Negotiate)
            }
            ShellCommand::Syst | ShellCommand::Help(_) => Some(Operation::Query),
            ShellCommand::Quit => Some(Operation::Quit),
            ShellCommand::Mode(_)
            | ShellCommand::Empty
            | ShellCommand::MissingArgument(_)
            | ShellCommand::Unknown(_) => None,
        }
    }
}

// Parse a typed line into a ShellCommand
pub fn parse_line(raw: &str) -> ShellCommand {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ShellCommand::Empty;
    }

    let mut parts = trimmed.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_ascii_lowercase();
    let first = parts.next().map(str::to_string);
    let second = parts.next().map(str::to_string);

    match cmd.as_str() {
        "user" => first.map_or(ShellCommand::MissingArgument("user <name>"), ShellCommand::User),
        // an empty password is legitimate for anonymous logins
        "pass" => ShellCommand::Pass(first.unwrap_or_default()),
        "cd" | "cwd" => first.map_or(ShellCommand::MissingArgument("cd <path>"), ShellCommand::Cd),
        "pwd" => ShellCommand::Pwd,
        "ls" | "dir" | "list" => ShellCommand::Ls(first),
        "get" | "retr" => match first {
            Some(remote) => ShellCommand::Get {
                remote,
                local: second,
            },
            None => ShellCommand::MissingArgument("get <remote> [local]"),
        },
        "put" | "stor" => match first {
            Some(local) => ShellCommand::Put {
                local,
                remote: second,
            },
            None => ShellCommand::MissingArgument("put <local> [remote]"),
        },
        "passive" | "pasv" => ShellCommand::Mode(TransferMode::Passive),
        "active" | "port" => ShellCommand::Mode(TransferMode::Active),
        "epsv" => ShellCommand::Mode(TransferMode::ExtendedPassive),
        "eprt" => ShellCommand::Mode(TransferMode::ExtendedActive),
        "syst" => ShellCommand::Syst,
        "help" | "?" => ShellCommand::Help(first),
        "quit" | "exit" | "bye" => ShellCommand::Quit,
        _ => ShellCommand::Unknown(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_line("pwd"), ShellCommand::Pwd);
        assert_eq!(parse_line("SYST"), ShellCommand::Syst);
        assert_eq!(parse_line("bye"), ShellCommand::Quit);
        assert_eq!(parse_line("ls"), ShellCommand::Ls(None));
        assert_eq!(parse_line("   "), ShellCommand::Empty);
    }

    #[test]
    fn test_parse_commands_with_args() {
        assert_eq!(parse_line("user anonymous"), ShellCommand::User("anonymous".into()));
        assert_eq!(parse_line("cd /pub"), ShellCommand::Cd("/pub".into()));
        assert_eq!(parse_line("ls /pub"), ShellCommand::Ls(Some("/pub".into())));
        assert_eq!(
            parse_line("get a.txt b.txt"),
            ShellCommand::Get {
                remote: "a.txt".into(),
                local: Some("b.txt".into())
            }
        );
        assert_eq!(
            parse_line("put local.bin"),
            ShellCommand::Put {
                local: "local.bin".into(),
                remote: None
            }
        );
        assert_eq!(parse_line("pass"), ShellCommand::Pass(String::new()));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(parse_line("passive"), ShellCommand::Mode(TransferMode::Passive));
        assert_eq!(parse_line("active"), ShellCommand::Mode(TransferMode::Active));
        assert_eq!(parse_line("epsv"), ShellCommand::Mode(TransferMode::ExtendedPassive));
        assert_eq!(parse_line("eprt"), ShellCommand::Mode(TransferMode::ExtendedActive));
    }

    #[test]
    fn test_missing_and_unknown() {
        assert!(matches!(parse_line("get"), ShellCommand::MissingArgument(_)));
        assert!(matches!(parse_line("cd"), ShellCommand::MissingArgument(_)));
        assert_eq!(parse_line("FOO bar"), ShellCommand::Unknown("FOO bar".into()));
    }

    #[test]
    fn test_operations() {
        assert_eq!(parse_line("get f").operation(), Some(Operation::Negotiate));
        assert_eq!(parse_line("user x").operation(), Some(Operation::Login));
        assert_eq!(parse_line("syst").operation(), Some(Operation::Query));
        assert_eq!(parse_line("epsv").operation(), None);
    }
}
