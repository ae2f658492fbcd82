//! Hand-written memcached ASCII command parser for the front-end
//!
//! Only retrieval and admin commands are accepted; the front-end never
//! takes writes from clients.

use crate::ProtocolError;
use crate::protocol::command::{Command, MAX_KEY_LENGTH, is_valid_key};
use std::borrow::Cow;

/// Case-insensitive command comparison (avoids allocation from to_ascii_lowercase)
#[inline]
pub(crate) fn cmd_eq(cmd: &[u8], expected: &[u8]) -> bool {
    cmd.len() == expected.len()
        && cmd
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| a.to_ascii_lowercase() == *b)
}

/// Result of parsing
#[derive(Debug)]
pub enum ParseResult<'a> {
    /// Command fully parsed
    Complete(Command<'a>, usize),
    /// Need more data to complete parsing
    NeedMoreData,
    /// Parse error
    Error(ProtocolError),
}

/// Parse a front-end command from a buffer
pub fn parse(buf: &[u8]) -> ParseResult<'_> {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return ParseResult::NeedMoreData,
    };

    let line = &buf[..line_end];
    let consumed = line_end + 2;

    let mut parts = line.split(|&b| b == b' ');
    let cmd_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return ParseResult::Error(ProtocolError::InvalidCommand("empty command".to_string())),
    };

    if cmd_eq(cmd_name, b"get") || cmd_eq(cmd_name, b"gets") {
        parse_get(parts, consumed)
    } else if cmd_eq(cmd_name, b"version") {
        ParseResult::Complete(Command::Version, consumed)
    } else if cmd_eq(cmd_name, b"stats") {
        ParseResult::Complete(Command::Stats, consumed)
    } else if cmd_eq(cmd_name, b"quit") {
        ParseResult::Complete(Command::Quit, consumed)
    } else {
        ParseResult::Error(ProtocolError::InvalidCommand(
            String::from_utf8_lossy(cmd_name).to_string(),
        ))
    }
}

/// Find \r\n in buffer using SIMD-accelerated search
#[inline]
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    memchr::memmem::find(buf, b"\r\n")
}

/// Parse get command
fn parse_get<'a>(parts: impl Iterator<Item = &'a [u8]>, consumed: usize) -> ParseResult<'a> {
    let mut keys = Vec::new();

    for part in parts {
        if part.is_empty() {
            continue;
        }
        if !is_valid_key(part) {
            if part.len() > MAX_KEY_LENGTH {
                return ParseResult::Error(ProtocolError::KeyTooLong);
            }
            return ParseResult::Error(ProtocolError::InvalidKey(
                String::from_utf8_lossy(part).to_string(),
            ));
        }
        keys.push(Cow::Borrowed(part));
    }

    if keys.is_empty() {
        return ParseResult::Error(ProtocolError::InvalidCommand(
            "get requires at least one key".to_string(),
        ));
    }

    ParseResult::Complete(Command::Get { keys }, consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let buf = b"get post:1 post:2\r\n";
        match parse(buf) {
            ParseResult::Complete(Command::Get { keys }, consumed) => {
                assert_eq!(keys.len(), 2);
                assert_eq!(keys[0].as_ref(), b"post:1");
                assert_eq!(keys[1].as_ref(), b"post:2");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_gets_is_get() {
        match parse(b"GETS post:9\r\n") {
            ParseResult::Complete(Command::Get { keys }, _) => assert_eq!(keys.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_pipelined() {
        let buf = b"version\r\nget post:3\r\n";
        match parse(buf) {
            ParseResult::Complete(Command::Version, consumed) => {
                assert_eq!(consumed, 9);
                match parse(&buf[consumed..]) {
                    ParseResult::Complete(Command::Get { .. }, _) => {}
                    other => panic!("unexpected: {:?}", other),
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_admin_commands() {
        assert!(matches!(parse(b"stats\r\n"), ParseResult::Complete(Command::Stats, 7)));
        assert!(matches!(parse(b"QUIT\r\n"), ParseResult::Complete(Command::Quit, 6)));
    }

    #[test]
    fn test_parse_need_more_data() {
        assert!(matches!(parse(b"get post:1"), ParseResult::NeedMoreData));
        assert!(matches!(parse(b"get post:1\r"), ParseResult::NeedMoreData));
    }

    #[test]
    fn test_writes_are_rejected() {
        match parse(b"set post:1 0 0 2\r\n{}\r\n") {
            ParseResult::Error(ProtocolError::InvalidCommand(name)) => assert_eq!(name, "set"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_get_without_keys() {
        assert!(matches!(
            parse(b"get\r\n"),
            ParseResult::Error(ProtocolError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_key_too_long() {
        let mut buf = b"get ".to_vec();
        buf.extend_from_slice(&[b'a'; 251]);
        buf.extend_from_slice(b"\r\n");

        assert!(matches!(parse(&buf), ParseResult::Error(ProtocolError::KeyTooLong)));
    }
}
