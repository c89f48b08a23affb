//! Wire-format plumbing: padded buffers and message framing.

pub(crate) use self::buf::{padding_to, WireBuf};
mod buf;

pub(crate) use self::frame_io::{read_frame, read_slice, read_slice_nul};
mod frame_io;

pub(crate) use self::codec::{decode_message, encode_message, RawHeader, HEADER_SIZE};
mod codec;

#[cfg(test)]
mod tests;

/// The maximum length of an array in bytes.
pub(crate) const MAX_ARRAY_LENGTH: u32 = 1u32 << 26;

/// The maximum length of a body in bytes.
pub(crate) const MAX_BODY_LENGTH: u32 = 1u32 << 27;
