//! Front-end command types (read-only memcached ASCII subset)

use std::borrow::Cow;

/// Maximum key length allowed by memcached
pub const MAX_KEY_LENGTH: usize = 250;

/// Parsed front-end command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// get <key>*
    Get { keys: Vec<Cow<'a, [u8]>> },

    /// version
    Version,

    /// stats
    Stats,

    /// quit
    Quit,
}

/// Check if a key is valid
pub fn is_valid_key(key: &[u8]) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    // Keys cannot contain control characters or whitespace
    key.iter().all(|&b| b > 32 && b < 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key(b"post:5"));
        assert!(is_valid_key(b"key-with-dashes"));
        assert!(!is_valid_key(b""));
        assert!(!is_valid_key(b"post: 5"));
        assert!(!is_valid_key(b"post:\t5"));
        assert!(!is_valid_key(&[b'a'; 251]));
    }
}
