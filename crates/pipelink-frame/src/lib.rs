//! Length-prefixed message framing for pipelink.
//!
//! Every message on the wire is a 4-byte little-endian payload length
//! followed by exactly that many payload bytes. No magic number, no
//! checksum, no version byte. The endpoint is a trusted local peer and
//! the framing exists only to restore message boundaries on a byte
//! stream.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
