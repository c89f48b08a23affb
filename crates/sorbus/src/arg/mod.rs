//! The compile-time mapping between native types and the D-Bus type system.
//!
//! Every type which can travel in a message body implements [`Arg`], which
//! ties together the type's wire [signature] and the pair of operators that
//! write and read it against a [`Message`] cursor. User-defined record types
//! derive it with `#[derive(Arg)]`.
//!
//! [signature]: crate::Signature
//! [`Message`]: crate::Message

mod scalars;

mod containers;

pub use self::args::Args;
mod args;

#[cfg(test)]
mod tests;

use crate::signature::SignatureBuilder;
use crate::{Message, Result, SignatureBuf, SignatureError};

/// A type with a canonical D-Bus wire representation.
///
/// The three members must agree: [`append`] writes exactly one value of the
/// shape described by [`signature`], and [`read`] consumes exactly that
/// shape.
///
/// Implemented for the primitive types, `String`, [`ObjectPathBuf`],
/// [`SignatureBuf`], [`UnixFd`], [`Variant`], `Vec<T>`, `[T; N]`,
/// `HashMap<K, V>` and tuples. Record types derive it:
///
/// ```
/// use sorbus::{signature_of, Arg};
///
/// #[derive(Arg, Debug, PartialEq)]
/// struct Station {
///     name: String,
///     frequency: f64,
/// }
///
/// assert_eq!(signature_of::<Station>()?, "(sd)");
/// # Ok::<_, sorbus::Error>(())
/// ```
///
/// [`append`]: Self::append
/// [`signature`]: Self::signature
/// [`read`]: Self::read
/// [`ObjectPathBuf`]: crate::ObjectPathBuf
/// [`SignatureBuf`]: crate::SignatureBuf
/// [`UnixFd`]: crate::UnixFd
/// [`Variant`]: crate::Variant
pub trait Arg: Sized {
    /// Append the signature of this type to the builder.
    #[doc(hidden)]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError>;

    /// Write one value to the message, below signature bookkeeping.
    #[doc(hidden)]
    fn append(&self, message: &mut Message) -> Result<()>;

    /// Read one value from the message, below signature bookkeeping.
    #[doc(hidden)]
    fn read(message: &mut Message) -> Result<Self>;
}

/// Marker for [`Arg`] types which are *basic* in the D-Bus sense and
/// therefore permitted as dict entry keys.
pub trait BasicArg: Arg {}

/// The canonical signature of `T`, derived at compile time from its [`Arg`]
/// implementation.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use sorbus::{signature_of, Variant};
///
/// assert_eq!(signature_of::<u32>()?, "u");
/// assert_eq!(signature_of::<Vec<String>>()?, "as");
/// assert_eq!(signature_of::<HashMap<String, Variant>>()?, "a{sv}");
/// assert_eq!(signature_of::<(i64, f64)>()?, "(xd)");
/// # Ok::<_, sorbus::Error>(())
/// ```
pub fn signature_of<T>() -> Result<SignatureBuf>
where
    T: Arg,
{
    let mut builder = SignatureBuilder::new();
    T::signature(&mut builder)?;
    Ok(builder.into_signature_buf())
}
