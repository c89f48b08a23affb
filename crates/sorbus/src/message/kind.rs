use crate::{ObjectPathBuf, Serial};

/// The kind of a D-Bus [`Message`].
///
/// [`Message`]: crate::Message
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageKind {
    /// Method call. This message type may prompt a reply.
    MethodCall {
        /// The path of the object being called.
        path: ObjectPathBuf,
        /// The member being called.
        member: Box<str>,
    },
    /// Method reply with returned data.
    MethodReturn {
        /// The serial this is a reply to.
        reply_serial: Serial,
    },
    /// Error reply. The first body argument, if present and a string, is the
    /// error message.
    Error {
        /// The name of the error.
        error_name: Box<str>,
        /// The serial this is a reply to.
        reply_serial: Serial,
    },
    /// Signal emission.
    Signal {
        /// The path of the object the signal is emitted from.
        path: ObjectPathBuf,
        /// The member being signalled.
        member: Box<str>,
    },
    /// A freestanding value carrier which never travels on its own, used
    /// for example as the backing store of a [`Variant`].
    ///
    /// [`Variant`]: crate::Variant
    Plain,
}
