//! Memcached ASCII protocol: front-end commands and cache client replies

pub mod command;
pub mod parser;
pub mod reply;
pub mod request;
pub mod response;

pub use command::{Command, MAX_KEY_LENGTH};
pub use parser::{ParseResult, parse};
pub use reply::{Reply, ReplyResult, parse_reply};
pub use response::ResponseWriter;
