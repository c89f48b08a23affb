pub use self::connection::{Connection, EventLoopState};
mod connection;

pub use self::event::PollData;
mod event;

mod pending;

/// Shared handle to the state of one pending asynchronous call.
pub(crate) type AsyncSharedHandle = std::sync::Arc<self::pending::AsyncShared>;

pub use self::future::MessageFuture;
mod future;

pub(crate) use self::inner::Inner;
mod inner;
