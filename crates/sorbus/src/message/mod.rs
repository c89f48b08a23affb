pub use self::serial::Serial;
mod serial;

pub use self::kind::MessageKind;
mod kind;

pub use self::message::{ContainerKind, Message};
mod message;

#[cfg(test)]
mod tests;
