//! Request encoding for talking to a memcached-compatible cache server

use bytes::BytesMut;
use itoa::Buffer;

/// get <key>\r\n
pub fn write_get(buf: &mut BytesMut, key: &[u8]) {
    buf.extend_from_slice(b"get ");
    buf.extend_from_slice(key);
    buf.extend_from_slice(b"\r\n");
}

/// set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
pub fn write_set(buf: &mut BytesMut, key: &[u8], flags: u32, exptime: u64, data: &[u8]) {
    let mut itoa_buf = Buffer::new();
    buf.extend_from_slice(b"set ");
    buf.extend_from_slice(key);
    buf.extend_from_slice(b" ");
    buf.extend_from_slice(itoa_buf.format(flags).as_bytes());
    buf.extend_from_slice(b" ");
    buf.extend_from_slice(itoa_buf.format(exptime).as_bytes());
    buf.extend_from_slice(b" ");
    buf.extend_from_slice(itoa_buf.format(data.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

/// version\r\n
pub fn write_version(buf: &mut BytesMut) {
    buf.extend_from_slice(b"version\r\n");
}
