//! # Streaming Byte Tokenizer
//!
//! Purpose: Cut delimiter- or length-bounded tokens out of a byte stream that
//! arrives as independent chunks, without first gluing the chunks together.
//!
//! ## Design Principles
//! 1. **Append-Only Arena**: Chunks are stored as `Bytes` and never removed, so
//!    a cursor of plain indices stays valid for the tokenizer's lifetime.
//! 2. **Forward-Only Cursor**: Consumed bytes are never revisited or re-copied.
//! 3. **All-or-Nothing Reads**: A token is either fully available and consumed,
//!    or nothing moves and the caller retries after adding more data.
//! 4. **Naive Matching**: Tokens are short (status line, header lines), so a
//!    byte-for-byte scan beats building skip tables.
//!
//! ## Structure Overview
//!
//! ```text
//! chunks:  [ "HTTP/1.1 2" ][ "00 OK\r" ][ "\n" ]
//!                      ^
//! cursor:  chunk = 0, offset = 9, consumed = 9
//! ```
//!
//! One tokenizer is created per request/response exchange, so retaining every
//! chunk until it is dropped is bounded by the size of one response.

use bytes::Bytes;

/// Location inside the chunk arena.
///
/// Normalized so that `offset < chunks[chunk].len()`, or `chunk == chunks.len()`
/// with `offset == 0` when the position sits at the end of buffered data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Position {
    chunk: usize,
    offset: usize,
}

/// Read cursor: a position plus the number of bytes consumed to reach it.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    pos: Position,
    consumed: usize,
}

/// Accumulates byte chunks and extracts tokens across chunk boundaries.
#[derive(Debug, Default)]
pub struct ByteTokenizer {
    chunks: Vec<Bytes>,
    cursor: Cursor,
    size: usize,
}

impl ByteTokenizer {
    /// Creates an empty tokenizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of bytes. Empty chunks are ignored.
    pub fn add(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.size += chunk.len();
        self.chunks.push(chunk);
    }

    /// Total number of bytes ever added.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bytes the cursor has moved past.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.cursor.consumed
    }

    /// Number of bytes added but not yet consumed.
    #[inline]
    pub fn available(&self) -> usize {
        self.size - self.cursor.consumed
    }

    /// Returns the bytes before the next occurrence of `delimiter` and moves
    /// the cursor past the delimiter.
    ///
    /// Returns `None` and leaves the cursor untouched when the delimiter is not
    /// fully present in the buffered data. An empty delimiter yields an empty
    /// token without moving the cursor.
    pub fn next_delimited(&mut self, delimiter: &[u8]) -> Option<Vec<u8>> {
        if delimiter.is_empty() {
            return Some(Vec::new());
        }
        let distance = self.find(delimiter)?;
        let token = self.copy_from_cursor(distance);
        self.consume(distance + delimiter.len());
        Some(token)
    }

    /// Returns exactly `amount` bytes and moves the cursor past them.
    ///
    /// Returns `None` without consuming anything if fewer than `amount` bytes
    /// are available.
    pub fn next_sized(&mut self, amount: usize) -> Option<Vec<u8>> {
        if self.available() < amount {
            return None;
        }
        let token = self.copy_from_cursor(amount);
        self.consume(amount);
        Some(token)
    }

    /// Distance from the cursor to the first byte of `pattern`, if present.
    fn find(&self, pattern: &[u8]) -> Option<usize> {
        let available = self.available();
        let mut pos = self.cursor.pos;
        let mut distance = 0;
        // A match must fit entirely inside the buffered data.
        while distance + pattern.len() <= available {
            if self.matches_at(pos, pattern) {
                return Some(distance);
            }
            pos = self.step(pos);
            distance += 1;
        }
        None
    }

    fn matches_at(&self, mut pos: Position, pattern: &[u8]) -> bool {
        for &expected in pattern {
            match self.byte_at(pos) {
                Some(actual) if actual == expected => pos = self.step(pos),
                _ => return false,
            }
        }
        true
    }

    #[inline]
    fn byte_at(&self, pos: Position) -> Option<u8> {
        self.chunks
            .get(pos.chunk)
            .and_then(|chunk| chunk.get(pos.offset))
            .copied()
    }

    /// Moves one byte forward, hopping to the next chunk at a boundary.
    #[inline]
    fn step(&self, pos: Position) -> Position {
        self.advance(pos, 1)
    }

    /// Moves `amount` bytes forward. The caller guarantees the bytes exist.
    fn advance(&self, mut pos: Position, mut amount: usize) -> Position {
        while amount > 0 && pos.chunk < self.chunks.len() {
            let remaining = self.chunks[pos.chunk].len() - pos.offset;
            let len = remaining.min(amount);
            pos.offset += len;
            amount -= len;
            if pos.offset == self.chunks[pos.chunk].len() {
                pos.chunk += 1;
                pos.offset = 0;
            }
        }
        pos
    }

    /// Copies `amount` bytes starting at the cursor into a fresh buffer.
    fn copy_from_cursor(&self, amount: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(amount);
        let mut pos = self.cursor.pos;
        while out.len() < amount {
            let chunk = &self.chunks[pos.chunk];
            let len = (chunk.len() - pos.offset).min(amount - out.len());
            out.extend_from_slice(&chunk[pos.offset..pos.offset + len]);
            pos.chunk += 1;
            pos.offset = 0;
        }
        out
    }

    fn consume(&mut self, amount: usize) {
        self.cursor.pos = self.advance(self.cursor.pos, amount);
        self.cursor.consumed += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tokens_across_fragments() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"GET /res"[..]);
        bt.add(&b"ource HTTP"[..]);
        bt.add(&b"/1.1\r\n"[..]);
        bt.add(&b"Accept: application/json\r\n"[..]);
        bt.add(&b"Accept-Encoding: gzip\r\n"[..]);

        assert_eq!(bt.next_delimited(b" ").unwrap(), b"GET");
        assert_eq!(bt.next_delimited(b" ").unwrap(), b"/resource");
        assert_eq!(bt.next_delimited(b"\r\n").unwrap(), b"HTTP/1.1");
        assert_eq!(
            bt.next_delimited(b"\r\n").unwrap(),
            b"Accept: application/json"
        );
        assert_eq!(bt.next_delimited(b"\r\n").unwrap(), b"Accept-Encoding: gzip");
        assert!(bt.next_delimited(b"\r\n").is_none());
        assert_eq!(bt.available(), 0);
    }

    #[test]
    fn extracts_sized_tokens() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"hello world"[..]);
        assert_eq!(bt.next_sized(2).unwrap(), b"he");
        assert_eq!(bt.next_sized(2).unwrap(), b"ll");
        assert_eq!(bt.next_sized(2).unwrap(), b"o ");
        assert_eq!(bt.next_sized(2).unwrap(), b"wo");
        assert!(bt.next_sized(5).is_none());
        assert_eq!(bt.available(), 3);
        assert_eq!(bt.next_sized(3).unwrap(), b"rld");
    }

    #[test]
    fn sized_token_spans_many_chunks() {
        let mut bt = ByteTokenizer::new();
        for part in [&b"ab"[..], &b"c"[..], &b"defg"[..], &b"h"[..]] {
            bt.add(part);
        }
        assert_eq!(bt.next_sized(1).unwrap(), b"a");
        assert_eq!(bt.next_sized(6).unwrap(), b"bcdefg");
        assert_eq!(bt.next_sized(1).unwrap(), b"h");
        assert_eq!(bt.next_sized(0).unwrap(), b"");
    }

    #[test]
    fn empty_token_when_delimiter_at_cursor() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"\r\nrest"[..]);
        assert_eq!(bt.next_delimited(b"\r\n").unwrap(), b"");
        assert_eq!(bt.consumed(), 2);
    }

    #[test]
    fn partial_delimiter_does_not_move_cursor() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"line\r"[..]);
        assert!(bt.next_delimited(b"\r\n").is_none());
        assert_eq!(bt.consumed(), 0);
        assert_eq!(bt.available(), 5);

        bt.add(&b"\nnext"[..]);
        assert_eq!(bt.next_delimited(b"\r\n").unwrap(), b"line");
        assert_eq!(bt.consumed(), 6);
        assert_eq!(bt.available(), 4);
    }

    #[test]
    fn insufficient_sized_read_does_not_consume() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"abc"[..]);
        assert!(bt.next_sized(4).is_none());
        assert_eq!(bt.consumed(), 0);
        bt.add(&b"d"[..]);
        assert_eq!(bt.next_sized(4).unwrap(), b"abcd");
    }

    #[test]
    fn empty_chunks_are_ignored() {
        let mut bt = ByteTokenizer::new();
        bt.add(Vec::<u8>::new());
        bt.add(&b"a b"[..]);
        bt.add(Bytes::new());
        assert_eq!(bt.size(), 3);
        assert_eq!(bt.next_delimited(b" ").unwrap(), b"a");
        assert!(bt.next_delimited(b" ").is_none());
    }

    #[test]
    fn overlapping_prefix_is_rescanned() {
        let mut bt = ByteTokenizer::new();
        bt.add(&b"xx\r\r"[..]);
        bt.add(&b"\nyy"[..]);
        assert_eq!(bt.next_delimited(b"\r\n").unwrap(), b"xx\r");
        assert_eq!(bt.next_sized(2).unwrap(), b"yy");
    }

    /// Drives a fixed script of reads and records every token produced.
    fn run_script(bt: &mut ByteTokenizer) -> Vec<Option<Vec<u8>>> {
        vec![
            bt.next_delimited(b" "),
            bt.next_delimited(b" "),
            bt.next_delimited(b"\r\n"),
            bt.next_delimited(b"\r\n"),
            bt.next_delimited(b"\r\n"),
            bt.next_sized(5),
            bt.next_delimited(b"\r\n"),
            bt.next_sized(4),
        ]
    }

    #[test]
    fn tokens_are_independent_of_chunk_boundaries() {
        let stream = b"HTTP/1.1 200 OK\r\nA: b\r\n\r\nhello\r\nbody";

        let mut whole = ByteTokenizer::new();
        whole.add(&stream[..]);
        let expected = run_script(&mut whole);
        assert!(expected.iter().all(Option::is_some));

        for first in 0..=stream.len() {
            for second in first..=stream.len() {
                let mut bt = ByteTokenizer::new();
                bt.add(&stream[..first]);
                bt.add(&stream[first..second]);
                bt.add(&stream[second..]);
                assert_eq!(run_script(&mut bt), expected, "split at {first}/{second}");
            }
        }

        let mut bytewise = ByteTokenizer::new();
        for byte in stream.iter() {
            bytewise.add(vec![*byte]);
        }
        assert_eq!(run_script(&mut bytewise), expected);
    }

    #[test]
    fn retry_after_more_data_matches_full_input() {
        let stream = b"first second\r\nthird";
        let mut bt = ByteTokenizer::new();
        let mut tokens = Vec::new();
        for byte in stream.iter() {
            bt.add(vec![*byte]);
            if tokens.is_empty() {
                if let Some(token) = bt.next_delimited(b" ") {
                    tokens.push(token);
                }
            } else if tokens.len() == 1 {
                if let Some(token) = bt.next_delimited(b"\r\n") {
                    tokens.push(token);
                }
            }
        }
        assert_eq!(tokens, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(bt.next_sized(5).unwrap(), b"third");
    }
}
