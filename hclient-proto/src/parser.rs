//! # Resumable Response Parser
//!
//! Purpose: Build a `Response` one token at a time from a `ByteTokenizer` that
//! is being fed socket reads of arbitrary size.
//!
//! ## Design Principles
//! 1. **Explicit State Machine**: A closed `ParseState` enum drives a single
//!    `match`; each state names the token it needs and the state that follows.
//! 2. **Resumable**: When the tokenizer cannot supply the next token, `parse`
//!    returns `Ok(false)` and the current state is kept. Completed transitions
//!    are never replayed.
//! 3. **Fail Fast**: Malformed framing aborts with a `ParseError`; there is no
//!    recovery within an exchange.
//!
//! ## Transitions
//!
//! ```text
//! Version -SP-> StatusCode -SP-> ReasonPhrase -CRLF-> Header <-+
//!                                                       |  |   | header line
//!                                                       |  +---+
//!                                   empty line          v
//!                     +-------------- Content-Length? --+-- chunked? --+
//!                     v                                 |              v
//!                   Body ---------------------------> Done <---- ChunkTrailer
//!                                                                     ^ size 0
//!                                          ChunkDataEnd <- ChunkData <- ChunkSize
//!                                               |                         ^
//!                                               +-------------------------+
//! ```

use crate::error::{ParseError, ParseResult};
use crate::tokenizer::ByteTokenizer;
use crate::types::{Header, Response};

const SP: &[u8] = b" ";
const CRLF: &[u8] = b"\r\n";

const HEADER_CONTENT_LENGTH: &str = "Content-Length";
const HEADER_TRANSFER_ENCODING: &str = "Transfer-Encoding";
const CHUNKED: &str = "chunked";

/// Position of the parser within a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Version,
    StatusCode,
    ReasonPhrase,
    Header,
    Body,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// Incremental HTTP/1.1 response decoder.
///
/// Create one per exchange, call `parse` after every `ByteTokenizer::add`, and
/// take the result with `into_response` once `parse` reports completion.
#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    version: String,
    status: u16,
    reason: String,
    headers: Vec<Header>,
    body: Vec<u8>,
    // Pending byte counts for the sized states.
    content_length: usize,
    chunk_size: usize,
    // Chunk payloads, merged into `body` once the terminal chunk is seen.
    chunks: Vec<Vec<u8>>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        ResponseParser {
            state: ParseState::Version,
            version: String::new(),
            status: 0,
            reason: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
            content_length: 0,
            chunk_size: 0,
            chunks: Vec::new(),
        }
    }

    /// Advances as far as the buffered data allows.
    ///
    /// Returns `Ok(true)` once the response is complete and `Ok(false)` when
    /// more bytes are needed.
    pub fn parse(&mut self, tokenizer: &mut ByteTokenizer) -> ParseResult<bool> {
        while self.state != ParseState::Done {
            let token = match self.next_token(tokenizer) {
                Some(token) => token,
                None => return Ok(false),
            };
            self.state = self.accept(token)?;
        }
        Ok(true)
    }

    #[inline]
    pub fn state(&self) -> ParseState {
        self.state
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// HTTP version from the status line, empty until it has been read.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the finished response, or `None` if parsing is incomplete.
    pub fn into_response(self) -> Option<Response> {
        if !self.is_done() {
            return None;
        }
        Some(Response {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
        })
    }

    fn next_token(&self, tokenizer: &mut ByteTokenizer) -> Option<Vec<u8>> {
        match self.state {
            ParseState::Version | ParseState::StatusCode => tokenizer.next_delimited(SP),
            ParseState::ReasonPhrase
            | ParseState::Header
            | ParseState::ChunkSize
            | ParseState::ChunkDataEnd
            | ParseState::ChunkTrailer => tokenizer.next_delimited(CRLF),
            ParseState::Body => tokenizer.next_sized(self.content_length),
            ParseState::ChunkData => tokenizer.next_sized(self.chunk_size),
            ParseState::Done => None,
        }
    }

    /// Applies one token to the current state and returns the next state.
    fn accept(&mut self, token: Vec<u8>) -> ParseResult<ParseState> {
        let next = match self.state {
            ParseState::Version => {
                self.version = lossy(token);
                ParseState::StatusCode
            }
            ParseState::StatusCode => {
                self.status = parse_status_code(&token)?;
                ParseState::ReasonPhrase
            }
            ParseState::ReasonPhrase => {
                self.reason = lossy(token);
                ParseState::Header
            }
            ParseState::Header => {
                if token.is_empty() {
                    // Empty line terminates the header section.
                    self.body_framing()?
                } else {
                    self.headers.push(parse_header_line(&token)?);
                    ParseState::Header
                }
            }
            ParseState::Body => {
                self.body = token;
                ParseState::Done
            }
            ParseState::ChunkSize => {
                self.chunk_size = parse_chunk_size(&token)?;
                if self.chunk_size == 0 {
                    ParseState::ChunkTrailer
                } else {
                    ParseState::ChunkData
                }
            }
            ParseState::ChunkData => {
                self.chunks.push(token);
                ParseState::ChunkDataEnd
            }
            ParseState::ChunkDataEnd => ParseState::ChunkSize,
            ParseState::ChunkTrailer => {
                if token.is_empty() {
                    self.body = std::mem::take(&mut self.chunks).concat();
                    ParseState::Done
                } else {
                    // Trailer fields are read past but not retained.
                    ParseState::ChunkTrailer
                }
            }
            ParseState::Done => ParseState::Done,
        };
        Ok(next)
    }

    /// Decides how the body is framed once all headers are known.
    fn body_framing(&mut self) -> ParseResult<ParseState> {
        if let Some(length) = self.declared_content_length()? {
            self.content_length = length;
            return Ok(ParseState::Body);
        }
        if self.is_chunked() {
            return Ok(ParseState::ChunkSize);
        }
        Ok(ParseState::Done)
    }

    fn declared_content_length(&self) -> ParseResult<Option<usize>> {
        match self.headers.iter().find(|h| h.is(HEADER_CONTENT_LENGTH)) {
            Some(header) => header
                .value
                .parse::<usize>()
                .map(Some)
                .map_err(|_| ParseError::InvalidContentLength(header.value.clone())),
            None => Ok(None),
        }
    }

    fn is_chunked(&self) -> bool {
        self.headers
            .iter()
            .filter(|h| h.is(HEADER_TRANSFER_ENCODING))
            .any(|h| h.value.eq_ignore_ascii_case(CHUNKED))
    }
}

fn lossy(token: Vec<u8>) -> String {
    String::from_utf8(token)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

fn parse_status_code(token: &[u8]) -> ParseResult<u16> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| ParseError::MalformedStatusLine(String::from_utf8_lossy(token).into_owned()))
}

fn parse_chunk_size(token: &[u8]) -> ParseResult<usize> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| ParseError::MalformedChunkSize(String::from_utf8_lossy(token).into_owned()))
}

/// Splits `Name: Value`, skipping any run of spaces after the colon.
fn parse_header_line(line: &[u8]) -> ParseResult<Header> {
    let colon = match line.iter().position(|&b| b == b':') {
        Some(idx) if idx > 0 => idx,
        _ => {
            return Err(ParseError::MalformedHeaderLine(
                String::from_utf8_lossy(line).into_owned(),
            ))
        }
    };
    let value_start = line[colon + 1..]
        .iter()
        .position(|&b| b != b' ')
        .map_or(line.len(), |offset| colon + 1 + offset);
    Ok(Header {
        name: String::from_utf8_lossy(&line[..colon]).into_owned(),
        value: String::from_utf8_lossy(&line[value_start..]).into_owned(),
    })
}
