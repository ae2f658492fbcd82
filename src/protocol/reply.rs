//! Parser for replies coming back from a memcached-compatible cache server

use crate::ProtocolError;
use crate::protocol::parser::{cmd_eq, find_crlf};

/// Largest value accepted from the cache (memcached's default item size limit)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// A single reply unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\n
    Value {
        key: Vec<u8>,
        flags: u32,
        data: Vec<u8>,
    },
    /// END (terminates a retrieval)
    End,
    Stored,
    NotStored,
    Version(String),
    /// ERROR, CLIENT_ERROR or SERVER_ERROR, with the full line
    Error(String),
}

/// Result of parsing one reply
#[derive(Debug)]
pub enum ReplyResult {
    Complete(Reply, usize),
    NeedMoreData,
    Error(ProtocolError),
}

/// Parse the next reply from a buffer
pub fn parse_reply(buf: &[u8]) -> ReplyResult {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return ReplyResult::NeedMoreData,
    };

    let line = &buf[..line_end];
    let consumed = line_end + 2;

    let mut parts = line.split(|&b| b == b' ');
    let head = parts.next().unwrap_or_default();

    if cmd_eq(head, b"value") {
        return parse_value(parts, buf, line_end);
    }

    let reply = if line == b"END" {
        Reply::End
    } else if line == b"STORED" {
        Reply::Stored
    } else if line == b"NOT_STORED" {
        Reply::NotStored
    } else if head == b"VERSION" {
        Reply::Version(String::from_utf8_lossy(&line[head.len()..]).trim().to_string())
    } else if head == b"ERROR" || head == b"CLIENT_ERROR" || head == b"SERVER_ERROR" {
        Reply::Error(String::from_utf8_lossy(line).to_string())
    } else {
        return ReplyResult::Error(ProtocolError::UnexpectedReply(
            String::from_utf8_lossy(line).to_string(),
        ));
    };

    ReplyResult::Complete(reply, consumed)
}

fn parse_value<'a>(
    mut parts: impl Iterator<Item = &'a [u8]>,
    buf: &'a [u8],
    line_end: usize,
) -> ReplyResult {
    let malformed = || {
        ReplyResult::Error(ProtocolError::UnexpectedReply(
            String::from_utf8_lossy(&buf[..line_end]).to_string(),
        ))
    };

    let key = match parts.next() {
        Some(k) if !k.is_empty() => k,
        _ => return malformed(),
    };
    let Some(flags) = parts.next().and_then(parse_num::<u32>) else {
        return malformed();
    };
    let Some(bytes) = parts.next().and_then(parse_num::<usize>) else {
        return malformed();
    };

    if bytes > MAX_VALUE_SIZE {
        return ReplyResult::Error(ProtocolError::UnexpectedData);
    }

    let data_start = line_end + 2;
    let Some((data_end, total_needed)) = data_start
        .checked_add(bytes)
        .and_then(|end| Some((end, end.checked_add(2)?)))
    else {
        return ReplyResult::Error(ProtocolError::UnexpectedData);
    };

    if buf.len() < total_needed {
        return ReplyResult::NeedMoreData;
    }

    if &buf[data_end..total_needed] != b"\r\n" {
        return ReplyResult::Error(ProtocolError::UnexpectedData);
    }

    ReplyResult::Complete(
        Reply::Value {
            key: key.to_vec(),
            flags,
            data: buf[data_start..data_end].to_vec(),
        },
        total_needed,
    )
}

fn parse_num<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_then_end() {
        let buf = b"VALUE post:5 0 2\r\n{}\r\nEND\r\n";
        let ReplyResult::Complete(reply, consumed) = parse_reply(buf) else {
            panic!("expected complete reply");
        };
        assert_eq!(
            reply,
            Reply::Value {
                key: b"post:5".to_vec(),
                flags: 0,
                data: b"{}".to_vec(),
            }
        );
        assert!(matches!(
            parse_reply(&buf[consumed..]),
            ReplyResult::Complete(Reply::End, 5)
        ));
    }

    #[test]
    fn test_parse_value_with_cas() {
        let buf = b"VALUE k 3 1 99\r\nx\r\n";
        assert!(matches!(
            parse_reply(buf),
            ReplyResult::Complete(Reply::Value { flags: 3, .. }, 19)
        ));
    }

    #[test]
    fn test_value_data_may_contain_crlf() {
        let buf = b"VALUE k 0 4\r\na\r\nb\r\n";
        let ReplyResult::Complete(Reply::Value { data, .. }, _) = parse_reply(buf) else {
            panic!("expected value");
        };
        assert_eq!(data, b"a\r\nb");
    }

    #[test]
    fn test_partial_value_needs_more_data() {
        assert!(matches!(
            parse_reply(b"VALUE post:5 0 10\r\n{\"id\""),
            ReplyResult::NeedMoreData
        ));
        assert!(matches!(parse_reply(b"STOR"), ReplyResult::NeedMoreData));
    }

    #[test]
    fn test_simple_replies() {
        assert!(matches!(parse_reply(b"STORED\r\n"), ReplyResult::Complete(Reply::Stored, 8)));
        assert!(matches!(
            parse_reply(b"NOT_STORED\r\n"),
            ReplyResult::Complete(Reply::NotStored, 12)
        ));
        match parse_reply(b"VERSION 1.6.21\r\n") {
            ReplyResult::Complete(Reply::Version(v), _) => assert_eq!(v, "1.6.21"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_error_replies() {
        match parse_reply(b"SERVER_ERROR out of memory\r\n") {
            ReplyResult::Complete(Reply::Error(line), _) => {
                assert_eq!(line, "SERVER_ERROR out of memory");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            parse_reply(b"ERROR\r\n"),
            ReplyResult::Complete(Reply::Error(_), _)
        ));
    }

    #[test]
    fn test_garbage_reply() {
        assert!(matches!(
            parse_reply(b"HELLO\r\n"),
            ReplyResult::Error(ProtocolError::UnexpectedReply(_))
        ));
        assert!(matches!(
            parse_reply(b"VALUE k 0 2\r\nabXY"),
            ReplyResult::Error(ProtocolError::UnexpectedData)
        ));
    }

    #[test]
    fn test_oversized_value_length() {
        assert!(matches!(
            parse_reply(b"VALUE post:5 0 18446744073709551615\r\n{}\r\nEND\r\n"),
            ReplyResult::Error(ProtocolError::UnexpectedData)
        ));

        // Over the ceiling is rejected before any data arrives
        let header = format!("VALUE post:5 0 {}\r\n", MAX_VALUE_SIZE + 1);
        assert!(matches!(
            parse_reply(header.as_bytes()),
            ReplyResult::Error(ProtocolError::UnexpectedData)
        ));

        let header = format!("VALUE post:5 0 {MAX_VALUE_SIZE}\r\n");
        assert!(matches!(parse_reply(header.as_bytes()), ReplyResult::NeedMoreData));
    }
}
