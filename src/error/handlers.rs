//! Error handlers
//!
//! Classifies client errors for the session and for user-facing output.

use crate::error::types::FtpClientError;
use crate::protocol::Reply;
use log::error;

/// Log an FTP client error
pub fn handle_error(err: &FtpClientError) {
    error!("FTP Client Error: {}", err);
}

/// Whether the error leaves the control channel unusable.
///
/// A parse error means the reply stream is desynchronized, so it is treated
/// the same as a lost connection.
pub fn is_fatal(err: &FtpClientError) -> bool {
    matches!(
        err,
        FtpClientError::ConnectionLost(_) | FtpClientError::Parse(_)
    )
}

/// The server's reply carried by the error, if any.
pub fn server_reply(err: &FtpClientError) -> Option<&Reply> {
    match err {
        FtpClientError::NegotiationFailed { reply, .. } => reply.as_ref(),
        FtpClientError::TransferFailed { reply, .. } => Some(reply),
        FtpClientError::Rejected(reply) => Some(reply),
        _ => None,
    }
}

/// Text to show the operator: the verbatim server reply when one exists,
/// otherwise the error description.
pub fn user_message(err: &FtpClientError) -> String {
    match server_reply(err) {
        Some(reply) => reply.to_string(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use std::io;

    #[test]
    fn test_fatal_classification() {
        let lost = FtpClientError::ConnectionLost(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(is_fatal(&lost));
        assert!(is_fatal(&FtpClientError::Parse(ParseError::Empty)));

        let rejected = FtpClientError::Rejected(Reply::new(550, "No such file"));
        assert!(!is_fatal(&rejected));
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = FtpClientError::TransferFailed {
            reply: Reply::new(451, "Local error in processing"),
            bytes: 5,
        };
        assert_eq!(user_message(&err), "451 Local error in processing");

        let err = FtpClientError::Io(io::Error::other("disk full"));
        assert_eq!(user_message(&err), "I/O error: disk full");
    }
}
