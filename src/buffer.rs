//! Growable inbound byte buffer with consume-from-front semantics.

use crate::constants::{BUF_CHUNK, MAX_BUFFER_SIZE};
use crate::error::{AmiError, AmiResult};

/// Accumulates raw socket reads and hands out delimiter-bounded slices.
///
/// Consumed bytes are tracked with an offset rather than shifted out on every
/// extract; [`compact`](Self::compact) reclaims the dead prefix once a whole
/// unit has been taken.
#[derive(Debug)]
pub(crate) struct AmiBuffer {
    data: Vec<u8>,
    /// Bytes before this offset have been consumed.
    start: usize,
}

impl AmiBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(BUF_CHUNK),
            start: 0,
        }
    }

    /// Append freshly-read bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Unconsumed length.
    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    /// Error out if the unconsumed region has grown past the ceiling.
    /// AMI has no length framing, so this is the only guard against a peer
    /// that streams data without ever terminating a block.
    pub fn check_size_limits(&self) -> AmiResult<()> {
        if self.len() > MAX_BUFFER_SIZE {
            return Err(AmiError::BufferOverflow {
                size: self.len(),
                limit: MAX_BUFFER_SIZE,
            });
        }
        Ok(())
    }

    /// Take everything up to (but excluding) the first occurrence of
    /// `pattern`, consuming the pattern as well. `None` until the pattern
    /// appears.
    pub fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        let haystack = &self.data[self.start..];
        let pos = haystack
            .windows(pattern.len())
            .position(|window| window == pattern)?;
        let unit = haystack[..pos].to_vec();
        self.start += pos + pattern.len();
        Some(unit)
    }

    /// Drop the consumed prefix. Cheap no-op while the prefix is small.
    pub fn compact(&mut self) {
        if self.start >= BUF_CHUNK || self.start == self.data.len() {
            self.data.drain(..self.start);
            self.start = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_consumes_pattern() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"one\r\n\r\ntwo");

        assert_eq!(buf.extract_until_pattern(b"\r\n\r\n").unwrap(), b"one");
        assert_eq!(buf.len(), 3);
        assert!(buf.extract_until_pattern(b"\r\n\r\n").is_none());
    }

    #[test]
    fn extract_across_feeds() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"partial\r\n");
        assert!(buf.extract_until_pattern(b"\r\n\r\n").is_none());

        buf.extend_from_slice(b"\r\nnext");
        assert_eq!(buf.extract_until_pattern(b"\r\n\r\n").unwrap(), b"partial");
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn pattern_split_across_feeds() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"block\r\n\r");
        assert!(buf.extract_until_pattern(b"\r\n\r\n").is_none());
        buf.extend_from_slice(b"\n");
        assert_eq!(buf.extract_until_pattern(b"\r\n\r\n").unwrap(), b"block");
    }

    #[test]
    fn compact_resets_offset_when_fully_consumed() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(b"x\r\n\r\n");
        buf.extract_until_pattern(b"\r\n\r\n").unwrap();
        buf.compact();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.start, 0);
    }

    #[test]
    fn size_limit_enforced() {
        let mut buf = AmiBuffer::new();
        buf.extend_from_slice(&vec![b'a'; MAX_BUFFER_SIZE + 1]);
        assert!(matches!(
            buf.check_size_limits(),
            Err(AmiError::BufferOverflow { .. })
        ));
    }
}
