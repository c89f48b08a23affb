pub use self::proxy::Proxy;
mod proxy;

pub use self::invoker::{AsyncMethodInvoker, MethodInvoker, MethodReplyFuture};
mod invoker;

pub use self::properties::{PropertyGetter, PropertySetter};
mod properties;

pub use self::signals::SignalSubscriber;
mod signals;

pub use self::handle::AsyncCallHandle;
mod handle;
