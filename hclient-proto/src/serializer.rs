//! # Request Serializer
//!
//! Writes the request line, headers and body exactly as given. Mirrors the
//! reusable-buffer style of the RESP encoder: callers pass the output buffer.

use crate::types::Request;

const SP: &[u8] = b" ";
const CRLF: &[u8] = b"\r\n";
const COLON_SP: &[u8] = b": ";
const VERSION: &[u8] = b"HTTP/1.1";

/// Appends the wire form of `request` to `out`.
pub fn encode_request(request: &Request, out: &mut Vec<u8>) {
    let headers_len: usize = request
        .headers
        .iter()
        .map(|h| h.name.len() + h.value.len() + COLON_SP.len() + CRLF.len())
        .sum();
    out.reserve(
        request.method.len() + request.uri.len() + VERSION.len() + 4 + headers_len + 2
            + request.body.len(),
    );

    out.extend_from_slice(request.method.as_bytes());
    out.extend_from_slice(SP);
    out.extend_from_slice(request.uri.as_bytes());
    out.extend_from_slice(SP);
    out.extend_from_slice(VERSION);
    out.extend_from_slice(CRLF);
    for header in &request.headers {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(COLON_SP);
        out.extend_from_slice(header.value.as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
    out.extend_from_slice(&request.body);
}
