//! Errors raised while decoding a response.
//!
//! Every variant is fatal to the exchange that produced it: the parser has no
//! way to resynchronize with the byte stream, so callers must abort and drop
//! the connection.

/// Result type for response parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Malformed response input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Status code was not a decimal integer.
    #[error("malformed status line: invalid status code {0:?}")]
    MalformedStatusLine(String),
    /// Header line without a colon, or with an empty name.
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),
    /// Chunk size line was not a hexadecimal integer.
    #[error("malformed chunk size: {0:?}")]
    MalformedChunkSize(String),
    /// Content-Length header value was not a non-negative integer.
    #[error("invalid content-length header value: {0:?}")]
    InvalidContentLength(String),
}
