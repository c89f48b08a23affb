//! Constants associated with the `org.freedesktop.DBus` bus driver.

use sorbus_core::{wire_enum, wire_flags};

use crate::ObjectPath;

/// Well known destination name.
pub const DESTINATION: &str = "org.freedesktop.DBus";

/// Well known interface name.
pub const INTERFACE: &str = "org.freedesktop.DBus";

/// Well known D-Bus path.
pub const PATH: &str = "/org/freedesktop/DBus";

/// Well known D-Bus path as a typed object path.
pub const PATH_OBJECT: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");

/// The `org.freedesktop.DBus.Peer` interface.
pub const PEER: &str = "org.freedesktop.DBus.Peer";

/// The `org.freedesktop.DBus.Introspectable` interface.
pub const INTROSPECTABLE: &str = "org.freedesktop.DBus.Introspectable";

/// The `org.freedesktop.DBus.Properties` interface.
pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";

/// The `org.freedesktop.DBus.ObjectManager` interface.
pub const OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

wire_flags! {
    /// The flags to a `RequestName` call.
    #[repr(u32)]
    pub enum NameFlag {
        /// Allow another application requesting the name with
        /// `REPLACE_EXISTING` to take it over.
        ALLOW_REPLACEMENT = 1,
        /// Try to replace the current owner, if there is one and it
        /// specified `ALLOW_REPLACEMENT`.
        REPLACE_EXISTING = 2,
        /// Fail the request instead of queueing behind the current owner.
        DO_NOT_QUEUE = 4,
    }
}

wire_enum! {
    /// The reply to a `RequestName` call.
    #[repr(u32)]
    pub enum NameReply {
        /// The caller is now the primary owner of the name.
        PRIMARY_OWNER = 1,
        /// The name already had an owner and the caller has been placed in
        /// the queue for it.
        IN_QUEUE = 2,
        /// The name already has an owner and `DO_NOT_QUEUE` was specified.
        EXISTS = 3,
        /// The caller already owns the name.
        ALREADY_OWNER = 4,
    }
}

wire_enum! {
    /// The reply to a `ReleaseName` call.
    #[repr(u32)]
    pub enum ReleaseNameReply {
        /// The name has been released.
        RELEASED = 1,
        /// The name does not exist on the bus.
        NON_EXISTENT = 2,
        /// The caller does not own the name.
        NOT_OWNER = 3,
    }
}
