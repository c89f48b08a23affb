//! A high-level D-Bus client/server library.
//!
//! sorbus lets an application expose objects on the bus through [`Object`]
//! adaptors and consume remote objects through [`Proxy`] facades, with
//! compile-time-checked marshalling between native values and the D-Bus
//! wire type system via the [`Arg`] trait and its derive macro.
//!
//! A [`Connection`] owns the bus handle and incorporates the I/O event
//! loop: run it blocking, on an internally managed thread, or drive it from
//! an external reactor through [`Connection::poll_data`] and
//! [`Connection::process_pending`].
//!
//! # Examples
//!
//! Expose an object and call it:
//!
//! ```no_run
//! use sorbus::{Connection, Method, Object, Proxy, Signature, VTable};
//!
//! let server = Connection::session()?;
//! server.request_name("org.example.Calculator")?;
//!
//! let mut object = Object::new(&server, "/org/example/calculator")?;
//!
//! object.add_vtable(
//!     "org.example.Calculator",
//!     VTable::new().method(Method::new(
//!         "Multiply",
//!         Signature::new_const(b"xd"),
//!         Signature::new_const(b"d"),
//!         |call, reply| {
//!             let (a, b) = call.read_all::<(i64, f64)>()?;
//!             reply.append(&(a as f64 * b))
//!         },
//!     )),
//! )?;
//!
//! object.publish()?;
//! server.enter_event_loop_async()?;
//!
//! let client = Connection::session()?;
//! let proxy = Proxy::new(&client, "org.example.Calculator", "/org/example/calculator")?;
//!
//! let (product,): (f64,) = proxy
//!     .call_method("Multiply")
//!     .on_interface("org.example.Calculator")
//!     .with_arguments(&(21i64, 2.0f64))?
//!     .get()?;
//!
//! assert_eq!(product, 42.0);
//! # Ok::<_, sorbus::Error>(())
//! ```

#![deny(missing_docs)]
#![allow(clippy::module_inception)]

#[macro_use]
mod macros;

pub mod proto;

pub mod org_freedesktop_dbus;

#[doc(inline)]
pub use self::error::{Error, Result};
pub mod error;

#[doc(inline)]
pub use self::signature::{Signature, SignatureBuf, SignatureBuilder, SignatureError};
pub(crate) mod signature;

#[doc(inline)]
pub use self::object_path::{ObjectPath, ObjectPathBuf, ObjectPathError};
mod object_path;

pub use self::frame::Frame;
mod frame;

pub(crate) mod wire;

#[doc(inline)]
pub use self::arg::{signature_of, Arg, Args, BasicArg};
pub(crate) mod arg;

/// Derives [`Arg`] for record types and fieldless integer-repr enums.
///
/// Records serialize as structs of their fields by default. Annotating the
/// type with `#[arg(dictionary)]` switches to the `a{sv}` form where every
/// key is a field name and every value is variant-wrapped;
/// `#[arg(dictionary, relaxed)]` additionally tolerates missing keys on
/// read (fields fall back to their `Default`) and skips unknown keys.
pub use sorbus_macros::Arg;

#[doc(inline)]
pub use self::message::{ContainerKind, Message, MessageKind, Serial};
mod message;

#[doc(inline)]
pub use self::variant::Variant;
mod variant;

#[doc(inline)]
pub use self::fd::UnixFd;
mod fd;

#[doc(inline)]
pub use self::match_rule::MatchRule;
mod match_rule;

mod sasl;

mod transport;

#[doc(inline)]
pub use self::slot::Slot;
mod slot;

#[doc(inline)]
pub use self::connection::{Connection, EventLoopState, MessageFuture, PollData};
mod connection;

#[doc(inline)]
pub use self::object::{
    Method, Object, Property, PropertyUpdate, ResultSink, SignalDef, SignalEmitter, VTable,
};
mod object;

#[doc(inline)]
pub use self::proxy::{
    AsyncCallHandle, AsyncMethodInvoker, MethodInvoker, MethodReplyFuture, PropertyGetter,
    PropertySetter, Proxy, SignalSubscriber,
};
mod proxy;

#[doc(inline)]
pub use self::standard_interfaces::{
    IntrospectableProxy, ObjectManagerProxy, PeerProxy, PropertiesProxy,
};
pub mod standard_interfaces;
