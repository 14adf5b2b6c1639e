// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sentinel framing for the request stream.
//
// A client sends one UTF-8 message terminated by `~~~`.  TCP delivers it in
// arbitrary pieces, so the sentinel itself may arrive split across two or
// more reads.  The framer accumulates raw bytes and rescans only the tail
// that could hold a sentinel started in an earlier read.

use bytes::BytesMut;
use tracing::trace;

use findpip_core::error::{FindpipError, Result};

/// Marks the end of a request message.
pub const SENTINEL: &[u8] = b"~~~";

/// Bytes requested from the socket per read.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Reassembles one sentinel-terminated message from a stream of chunks.
///
/// No size limit is enforced: a sender that never transmits the sentinel
/// keeps growing the buffer until it disconnects.
#[derive(Debug, Default)]
pub struct MessageFramer {
    /// Bytes received since the last completed message.
    buffer: BytesMut,
    /// Number of chunks pushed since the last completed message.
    chunks: usize,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            chunks: 0,
        }
    }

    /// Feed the next chunk read from the socket.
    ///
    /// Returns `Ok(Some(message))` once the sentinel has been seen, with the
    /// sentinel and anything after it removed, and resets the framer.
    /// Returns `Ok(None)` while the message is still incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`FindpipError::Frame`] if the completed message is not valid
    /// UTF-8.  Decoding happens on the whole message, so a multi-byte
    /// character split between reads is not an error.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<String>> {
        // A sentinel that started in an earlier chunk begins at most
        // `SENTINEL.len() - 1` bytes before the new data.
        let search_from = self.buffer.len().saturating_sub(SENTINEL.len() - 1);
        self.buffer.extend_from_slice(chunk);
        self.chunks += 1;

        let Some(offset) = find_subsequence(&self.buffer[search_from..], SENTINEL) else {
            trace!(
                buffered = self.buffer.len(),
                chunks = self.chunks,
                "message incomplete"
            );
            return Ok(None);
        };

        let message = self.buffer.split_to(search_from + offset);
        trace!(
            bytes = message.len(),
            chunks = self.chunks,
            trailing = self.buffer.len() - SENTINEL.len(),
            "sentinel found"
        );
        self.buffer.clear();
        self.chunks = 0;

        String::from_utf8(message.to_vec())
            .map(Some)
            .map_err(|e| FindpipError::Frame(e.to_string()))
    }

    /// Bytes buffered for the message in progress.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes of a new message have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Chunks pushed for the message in progress.
    pub fn chunks_received(&self) -> usize {
        self.chunks
    }
}

/// Find the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `stream` in pieces of `size` bytes and return the first message.
    fn frame_in_chunks(stream: &[u8], size: usize) -> Option<String> {
        let mut framer = MessageFramer::new();
        for chunk in stream.chunks(size) {
            if let Some(message) = framer.push(chunk).unwrap() {
                return Some(message);
            }
        }
        None
    }

    #[test]
    fn single_chunk_message() {
        let mut framer = MessageFramer::new();
        let message = framer.push(b"http://x/a.jpg~~~").unwrap();
        assert_eq!(message.as_deref(), Some("http://x/a.jpg"));
        assert!(framer.is_empty());
    }

    #[test]
    fn sentinel_split_at_chunk_boundary() {
        let mut framer = MessageFramer::new();
        assert_eq!(framer.push(b"http://x/a.jpg~").unwrap(), None);
        assert_eq!(framer.chunks_received(), 1);
        let message = framer.push(b"~~").unwrap();
        assert_eq!(message.as_deref(), Some("http://x/a.jpg"));
    }

    #[test]
    fn sentinel_split_across_three_chunks() {
        let mut framer = MessageFramer::new();
        assert_eq!(framer.push(b"http://x/a.jpg~").unwrap(), None);
        assert_eq!(framer.push(b"~").unwrap(), None);
        assert_eq!(framer.push(b"~").unwrap().as_deref(), Some("http://x/a.jpg"));
    }

    #[test]
    fn any_chunking_matches_single_chunk_delivery() {
        let stream = "https://example.org/scans/bed%201.tiff***DebugFileOn***returncolor~~~".as_bytes();
        let whole = frame_in_chunks(stream, stream.len()).unwrap();
        for size in 1..=stream.len() {
            assert_eq!(frame_in_chunks(stream, size).as_deref(), Some(whole.as_str()), "chunk size {size}");
        }
    }

    #[test]
    fn multibyte_character_split_between_reads() {
        let stream = "http://h/é.png~~~".as_bytes();
        // 'é' is two bytes; size 10 splits it.
        assert_eq!(frame_in_chunks(stream, 10).as_deref(), Some("http://h/é.png"));
    }

    #[test]
    fn bytes_after_sentinel_are_dropped() {
        let mut framer = MessageFramer::new();
        let message = framer.push(b"http://h/a.png~~~trailing junk").unwrap();
        assert_eq!(message.as_deref(), Some("http://h/a.png"));
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn tildes_short_of_a_sentinel_stay_in_the_message() {
        let mut framer = MessageFramer::new();
        assert_eq!(framer.push(b"a~~b~").unwrap(), None);
        assert_eq!(framer.push(b"~c~~~").unwrap().as_deref(), Some("a~~b~~c"));
    }

    #[test]
    fn incomplete_message_keeps_buffering() {
        let mut framer = MessageFramer::new();
        assert_eq!(framer.push(b"http://h/").unwrap(), None);
        assert_eq!(framer.push(b"a.png").unwrap(), None);
        assert_eq!(framer.buffered_len(), 14);
    }

    #[test]
    fn invalid_utf8_is_a_frame_error() {
        let mut framer = MessageFramer::new();
        let result = framer.push(b"http://h/\xff\xfe.png~~~");
        assert!(matches!(result, Err(FindpipError::Frame(_))));
    }

    #[test]
    fn empty_message_is_allowed() {
        let mut framer = MessageFramer::new();
        assert_eq!(framer.push(b"~~~").unwrap().as_deref(), Some(""));
    }
}
