pub use self::vtable::{Method, Property, PropertyUpdate, SignalDef, VTable};
pub(crate) use self::vtable::RegisteredInterface;
mod vtable;

pub use self::result_sink::ResultSink;
mod result_sink;

pub use self::object::{Object, SignalEmitter};
mod object;

pub(crate) use self::dispatch::dispatch_method_call;
mod dispatch;

pub(crate) use self::introspect::introspect_path;
mod introspect;

#[cfg(test)]
mod tests;
