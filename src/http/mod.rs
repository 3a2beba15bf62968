//! Byte-exact HTTP/1.x messages
//!
//! Messages are kept as they appear on the wire: header order and name case
//! are preserved and bodies are never decoded, so a parsed canonical message
//! serializes back to the same bytes.

pub mod message;
pub mod reader;

#[cfg(test)]
mod message_proptest;

pub use message::{HeaderLine, RawMessage, StartLine};
pub use reader::{read_request, read_response};
