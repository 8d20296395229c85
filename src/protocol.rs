//! Incremental framing of the AMI byte stream into [`AmiMessage`] blocks.

use crate::buffer::AmiBuffer;
use crate::constants::{BLOCK_TERMINATOR, LINE_TERMINATOR};
use crate::error::{AmiError, AmiResult};
use crate::message::AmiMessage;
use tracing::trace;

/// Stateful decoder: feed it raw reads, pull complete blocks.
///
/// A block is everything up to the next blank line (`\r\n\r\n`). There is no
/// length framing, so once a block fails to decode the stream position is
/// untrustworthy — decode errors are fatal to the connection by policy, and
/// the reader loop tears the connection down when one surfaces.
pub(crate) struct AmiCodec {
    buffer: AmiBuffer,
}

impl AmiCodec {
    pub fn new() -> Self {
        Self {
            buffer: AmiBuffer::new(),
        }
    }

    /// Buffer freshly-read bytes, enforcing the runaway-peer size limit.
    pub fn extend(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer.extend_from_slice(data);
        self.buffer.check_size_limits()
    }

    /// Decode the next complete block, or `None` if more bytes are needed.
    ///
    /// Each call yields at most one message; callers loop until `None`.
    /// An empty block (stray terminator) is skipped rather than surfaced.
    pub fn next_block(&mut self) -> AmiResult<Option<AmiMessage>> {
        loop {
            let Some(raw) = self.buffer.extract_until_pattern(BLOCK_TERMINATOR.as_bytes()) else {
                return Ok(None);
            };
            self.buffer.compact();

            if raw.is_empty() {
                trace!("skipping empty block");
                continue;
            }

            let text = String::from_utf8(raw)
                .map_err(|_| AmiError::protocol("invalid UTF-8 in block"))?;
            return AmiMessage::from_wire_block(&text).map(Some);
        }
    }

    /// Take one bare CRLF-terminated line off the front of the buffer.
    ///
    /// Only used for the connection greeting (`Asterisk Call Manager/x.y`),
    /// which is a single line outside any block. Never call this once block
    /// traffic has started.
    pub fn take_line(&mut self) -> AmiResult<Option<String>> {
        let Some(raw) = self.buffer.extract_until_pattern(LINE_TERMINATOR.as_bytes()) else {
            return Ok(None);
        };
        self.buffer.compact();
        String::from_utf8(raw)
            .map(Some)
            .map_err(|_| AmiError::protocol("invalid UTF-8 in greeting line"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_feed_yields_block_once_complete() {
        let mut codec = AmiCodec::new();

        codec.extend(b"Response: Success\r\nActionID: 42").unwrap();
        assert!(codec.next_block().unwrap().is_none());

        codec.extend(b"\r\n\r\n").unwrap();
        let msg = codec.next_block().unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Success"));
        assert_eq!(msg.get("ActionID"), Some("42"));
        assert!(codec.next_block().unwrap().is_none());
    }

    #[test]
    fn two_blocks_in_one_feed() {
        let mut codec = AmiCodec::new();
        codec
            .extend(b"Event: Newchannel\r\n\r\nEvent: Hangup\r\n\r\n")
            .unwrap();

        let first = codec.next_block().unwrap().unwrap();
        assert_eq!(first.get("Event"), Some("Newchannel"));
        let second = codec.next_block().unwrap().unwrap();
        assert_eq!(second.get("Event"), Some("Hangup"));
        assert!(codec.next_block().unwrap().is_none());
    }

    #[test]
    fn bare_lf_terminator_not_matched() {
        // AMI is CRLF-delimited. A peer sending \n\n is out of spec; the
        // framer must not treat it as a block boundary. This documents the
        // chosen behavior: the data just sits in the buffer.
        let mut codec = AmiCodec::new();
        codec.extend(b"Response: Success\n\n").unwrap();
        assert!(codec.next_block().unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut codec = AmiCodec::new();
        codec.extend(b"garbage without colon\r\n\r\n").unwrap();
        assert!(matches!(
            codec.next_block(),
            Err(AmiError::MalformedLine { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_a_protocol_error() {
        let mut codec = AmiCodec::new();
        codec.extend(b"Key: \xff\xfe\r\n\r\n").unwrap();
        assert!(matches!(codec.next_block(), Err(AmiError::Protocol { .. })));
    }

    #[test]
    fn empty_block_skipped() {
        let mut codec = AmiCodec::new();
        codec.extend(b"\r\n\r\nEvent: Reload\r\n\r\n").unwrap();
        let msg = codec.next_block().unwrap().unwrap();
        assert_eq!(msg.get("Event"), Some("Reload"));
    }

    #[test]
    fn take_line_for_greeting() {
        let mut codec = AmiCodec::new();
        codec.extend(b"Asterisk Call Manager/5.0").unwrap();
        assert!(codec.take_line().unwrap().is_none());

        codec.extend(b".1\r\nResponse: Success\r\n\r\n").unwrap();
        assert_eq!(
            codec.take_line().unwrap().unwrap(),
            "Asterisk Call Manager/5.0.1"
        );
        // Remaining bytes still frame as a normal block.
        let msg = codec.next_block().unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Success"));
    }

    #[test]
    fn oversized_unterminated_buffer_rejected() {
        use crate::constants::MAX_BUFFER_SIZE;
        let mut codec = AmiCodec::new();
        let chunk = vec![b'a'; MAX_BUFFER_SIZE / 2 + 1];
        codec.extend(&chunk).unwrap();
        assert!(matches!(
            codec.extend(&chunk),
            Err(AmiError::BufferOverflow { .. })
        ));
    }
}
