pub use self::signature::Signature;
mod signature;

pub use self::signature_buf::SignatureBuf;
mod signature_buf;

pub use self::signature_builder::SignatureBuilder;
mod signature_builder;

pub use self::iter::{Iter, Type};
mod iter;

pub use self::signature_error::SignatureError;
pub(crate) use self::signature_error::SignatureErrorKind;
mod signature_error;

use self::scan::{complete_len, validate};
mod scan;

#[cfg(test)]
mod tests;

/// The longest signature the protocol permits, in bytes.
#[doc(hidden)]
pub const MAX_SIGNATURE_LEN: usize = 255;

/// How deeply arrays may nest.
#[doc(hidden)]
pub const MAX_ARRAY_NESTING: usize = 32;

/// How deeply structs and dict entries may nest.
#[doc(hidden)]
pub const MAX_PAIR_NESTING: usize = 32;
