//! FTP reply handling
//!
//! Defines the structured server reply and the reply codes the client acts on.

use std::fmt;

/// Standard FTP reply codes
pub const DATA_ALREADY_OPEN: u16 = 125;
pub const OPENING_DATA: u16 = 150;
pub const COMMAND_OK: u16 = 200;
pub const HELP_MESSAGE: u16 = 214;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const CLOSING_CONTROL: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const EXTENDED_PASSIVE_MODE: u16 = 229;
pub const LOGGED_IN: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;

/// A single server reply: a 3-digit code and the text that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
    multiline: bool,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            multiline: false,
        }
    }

    pub(crate) fn with_continuation(mut self, multiline: bool) -> Self {
        self.multiline = multiline;
        self
    }

    /// True when the line used `-` as separator, opening a multi-line reply.
    pub fn is_multiline_start(&self) -> bool {
        self.multiline
    }

    /// 1xx
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 4xx
    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// 5xx
    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Returns the substring between the first `(` and the last `)` of the text.
    pub fn parenthesized(&self) -> Option<&str> {
        let start = self.text.find('(')?;
        let end = self.text.rfind(')')?;
        (start < end).then(|| &self.text[start + 1..end])
    }

    /// Extracts the path from a 257 reply: `257 "/home/user" is current directory`.
    ///
    /// Doubled quotes inside the path are unescaped.
    pub fn quoted_path(&self) -> Option<String> {
        let body = self.text.strip_prefix('"')?;
        let mut path = String::new();
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    path.push('"');
                } else {
                    return Some(path);
                }
            } else {
                path.push(c);
            }
        }
        None
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_classes() {
        assert!(Reply::new(150, "Opening").is_preliminary());
        assert!(Reply::new(226, "Done").is_completion());
        assert!(Reply::new(331, "Password").is_intermediate());
        assert!(Reply::new(425, "No data").is_transient_failure());
        assert!(Reply::new(550, "Not found").is_permanent_failure());
    }

    #[test]
    fn test_parenthesized() {
        let reply = Reply::new(227, "Entering Passive Mode (10,0,0,1,4,1).");
        assert_eq!(reply.parenthesized(), Some("10,0,0,1,4,1"));
        assert_eq!(Reply::new(227, "no address").parenthesized(), None);
    }

    #[test]
    fn test_quoted_path() {
        let reply = Reply::new(257, "\"/home/user\" is current directory");
        assert_eq!(reply.quoted_path().as_deref(), Some("/home/user"));

        let reply = Reply::new(257, "\"/odd\"\"name\" created");
        assert_eq!(reply.quoted_path().as_deref(), Some("/odd\"name"));

        assert_eq!(Reply::new(257, "no quotes").quoted_path(), None);
    }
}
