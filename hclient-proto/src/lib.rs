//! # hclient wire protocol
//!
//! Purpose: Encode HTTP/1.1 requests and decode responses incrementally, with
//! no I/O and no threads, so the connection layer can feed bytes as they come.
//!
//! ## Design Principles
//! 1. **Resumable Parsing**: The parser stops when starved and picks up where
//!    it left off once more bytes are added.
//! 2. **Chunk-Friendly Input**: Socket reads are kept as separate chunks; tokens
//!    may span any number of them.
//! 3. **Fail Fast**: Malformed framing surfaces as a typed error immediately.
//! 4. **Plain Values**: Requests and responses are owned, fully materialized
//!    structs.

mod error;
mod parser;
mod serializer;
mod tokenizer;
mod types;

pub use error::{ParseError, ParseResult};
pub use parser::{ParseState, ResponseParser};
pub use serializer::encode_request;
pub use tokenizer::ByteTokenizer;
pub use types::{AddressError, Header, HostPort, Request, Response};
