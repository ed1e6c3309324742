//! FTP reply parsing
//!
//! Turns one raw control-channel line into a structured `Reply`.

use log::trace;

use crate::error::ParseError;
use crate::protocol::Reply;

/// Parse a raw server line into a reply.
///
/// The line must start with three ASCII digits followed by a space or `-`.
/// The text is everything after the separator with trailing CR/LF removed.
/// A failure here means the reply stream is out of step with the commands
/// sent and must not be retried.
pub fn parse_reply(raw: &[u8]) -> Result<Reply, ParseError> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let bytes = line.as_bytes();
    if bytes.len() < 4 {
        return Err(ParseError::TooShort(line.to_string()));
    }

    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidCode(line.to_string()));
    }

    let multiline = match bytes[3] {
        b' ' => false,
        b'-' => true,
        _ => return Err(ParseError::MissingSeparator(line.to_string())),
    };

    // Three ASCII digits always fit a u16
    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    let text = &line[4..];

    trace!("Parsed reply: code={}, text={:?}", code, text);

    Ok(Reply::new(code, text).with_continuation(multiline))
}
