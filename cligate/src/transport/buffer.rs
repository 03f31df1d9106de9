//! Output accumulation buffer with tail-limited prompt search.
//!
//! Prompt patterns only ever match at the end of output, so searching the
//! last few hundred bytes instead of the whole buffer keeps large command
//! outputs (full routing tables) cheap to scan on every received chunk.

use regex::bytes::Regex;

/// Accumulates device output and searches its tail for a prompt pattern.
#[derive(Debug)]
pub struct PatternBuffer {
    buffer: Vec<u8>,
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append a chunk of device output, stripping ANSI escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// Whether the prompt pattern matches within the buffer tail.
    pub fn prompt_seen(&self, pattern: &Regex) -> bool {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.is_match(&self.buffer[start..])
    }

    /// Take the accumulated output, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Accumulated output as a lossy UTF-8 string.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.take(), b"Green text");
    }

    #[test]
    fn test_prompt_in_tail() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 200]);
        buffer.extend(b"\nrouter#");
        let pattern = Regex::new(r"#\s*$").unwrap();
        assert!(buffer.prompt_seen(&pattern));
    }

    #[test]
    fn test_prompt_outside_tail_not_seen() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 200]);
        let pattern = Regex::new(r"router#").unwrap();
        assert!(!buffer.prompt_seen(&pattern));
    }

    #[test]
    fn test_take_resets() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"output");
        assert_eq!(buffer.take(), b"output");
        assert!(buffer.is_empty());
    }
}
