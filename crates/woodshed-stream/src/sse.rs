//! Incremental decoder for the backend's text event stream.
//!
//! Chunks may split a frame anywhere, including inside a line or inside a
//! multi-byte UTF-8 sequence, so the decoder buffers raw bytes and only
//! decodes a frame once its terminating blank line has arrived.

use tracing::debug;

use crate::errors::FrameError;

/// One decoded frame: the event name and its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Splits a byte stream into frames separated by blank lines.
#[derive(Debug, Default)]
pub struct FrameParser {
    buf: Vec<u8>,
    /// Bytes before this offset are known not to start a delimiter.
    scanned: usize,
}

/// Longest delimiter minus one; a partial delimiter can hide in this tail.
const DELIMITER_TAIL: usize = 3;

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns every frame it completed.
    ///
    /// Frames whose payload cannot be parsed are dropped here.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf, self.scanned) {
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            self.scanned = 0;
            if let Some(frame) = decode_or_drop(&frame_bytes) {
                frames.push(frame);
            }
        }
        self.scanned = self.buf.len().saturating_sub(DELIMITER_TAIL);
        frames
    }

    /// Flushes a trailing frame that never received its blank line.
    ///
    /// Call once the transport reports end of stream.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        decode_or_drop(&rest)
    }

    /// Number of bytes waiting for a frame terminator.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

fn decode_or_drop(bytes: &[u8]) -> Option<Frame> {
    match parse_frame(bytes) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(error = %err, bytes = bytes.len(), "dropping unparsable frame");
            None
        }
    }
}

/// Finds the first blank line at or after `from`.
///
/// A blank line is `\n\n`, `\r\n\r\n`, or `\n\r\n` (LF-terminated line followed
/// by a CRLF blank line). Returns the frame length and the delimiter length.
fn find_frame_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buf.len()).find_map(|i| {
        let rest = &buf[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\n\r\n") {
            Some((i, 3))
        } else {
            None
        }
    })
}

/// Parses one complete frame.
///
/// Returns `Ok(None)` for frames that carry nothing (only comments or blank
/// lines). When several `data:` lines appear, the last one wins.
pub(crate) fn parse_frame(bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data: Option<&str> = None;
    for raw_line in text.split('\n') {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data = Some(rest.trim());
        }
    }
    let Some(data) = data else {
        return match event {
            None => Ok(None),
            Some(_) => Err(FrameError::MissingData),
        };
    };
    let payload =
        serde_json::from_str(data).map_err(|e| FrameError::MalformedJson(e.to_string()))?;
    Ok(Some(Frame {
        event: event.unwrap_or_default(),
        payload,
    }))
}
