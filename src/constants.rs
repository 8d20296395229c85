//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from the stream (64KB) - standard TCP receive window
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
/// Handles virtually all AMI blocks without reallocation
pub const BUF_CHUNK: usize = 64 * 1024;

/// Maximum inbound buffer size (8MB). AMI has no length framing, so this is
/// the backstop against a peer that never terminates a block.
pub const MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// AMI is CRLF-delimited; a lone `\n\n` does not end a block.
pub const LINE_TERMINATOR: &str = "\r\n";
/// A blank line after the last field ends the block.
pub const BLOCK_TERMINATOR: &str = "\r\n\r\n";

/// TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default response wait in milliseconds (0 disables the timeout)
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Maximum number of queued events per subscriber before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
