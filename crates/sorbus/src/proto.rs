//! Low level constants of the D-Bus wire protocol.

#[doc(inline)]
pub use sorbus_core::proto::{Endianness, Flags, HeaderField, MessageType, Type};
