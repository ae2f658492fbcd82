//! Memcached ASCII protocol response builder (front-end side)

use bytes::BytesMut;
use itoa::Buffer;

/// Response writer for memcached ASCII protocol
pub struct ResponseWriter {
    buf: BytesMut,
}

impl ResponseWriter {
    /// Create a new response writer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the internal buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Take the buffer, leaving an empty buffer in its place
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append `words` separated by single spaces, then CRLF
    fn line(&mut self, words: &[&[u8]]) {
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                self.buf.extend_from_slice(b" ");
            }
            self.buf.extend_from_slice(word);
        }
        self.buf.extend_from_slice(b"\r\n");
    }

    /// `VALUE <key> <flags> <bytes>` followed by the data block
    pub fn value(&mut self, key: &[u8], flags: u32, data: &[u8]) {
        let mut flags_buf = Buffer::new();
        let mut len_buf = Buffer::new();
        self.line(&[
            b"VALUE",
            key,
            flags_buf.format(flags).as_bytes(),
            len_buf.format(data.len()).as_bytes(),
        ]);
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Terminates both get and stats replies
    pub fn end(&mut self) {
        self.line(&[b"END"]);
    }

    pub fn stat(&mut self, name: &str, value: u64) {
        let mut value_buf = Buffer::new();
        self.line(&[b"STAT", name.as_bytes(), value_buf.format(value).as_bytes()]);
    }

    pub fn version(&mut self, version: &str) {
        self.line(&[b"VERSION", version.as_bytes()]);
    }

    /// The request was malformed; the connection stays usable
    pub fn client_error(&mut self, message: &str) {
        self.line(&[b"CLIENT_ERROR", message.as_bytes()]);
    }

    /// The request was fine but could not be served
    pub fn server_error(&mut self, message: &str) {
        self.line(&[b"SERVER_ERROR", message.as_bytes()]);
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_response() {
        let mut writer = ResponseWriter::new(256);
        writer.value(b"post:1", 0, br#"{"id":1}"#);
        writer.end();

        let expected = b"VALUE post:1 0 8\r\n{\"id\":1}\r\nEND\r\n";
        assert_eq!(writer.buffer(), &expected[..]);
    }

    #[test]
    fn test_stats() {
        let mut writer = ResponseWriter::new(256);
        writer.stat("cache_hits", 12);
        writer.end();
        assert_eq!(writer.take().as_ref(), b"STAT cache_hits 12\r\nEND\r\n");
        assert!(writer.is_empty());
    }

    #[test]
    fn test_errors() {
        let mut writer = ResponseWriter::new(256);

        writer.client_error("bad key");
        assert_eq!(writer.take().as_ref(), b"CLIENT_ERROR bad key\r\n");

        writer.server_error("origin unavailable");
        assert_eq!(writer.take().as_ref(), b"SERVER_ERROR origin unavailable\r\n");
    }

    #[test]
    fn test_version() {
        let mut writer = ResponseWriter::new(256);
        writer.version("readthrough 0.1.0");
        assert_eq!(writer.buffer(), b"VERSION readthrough 0.1.0\r\n");
    }
}
