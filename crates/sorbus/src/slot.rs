use std::fmt;
use std::sync::Weak;

use crate::connection::Inner;

/// What a [`Slot`] tears down when dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    /// A match rule registration.
    Match,
    /// A vtable registration at an (object path, interface) pair.
    VTable,
    /// An object manager registration.
    ObjectManager,
    /// A pending method call, keyed by its wire serial.
    PendingCall,
}

/// A scoped registration token.
///
/// Every subscription a connection hands out — match rules, vtables, object
/// managers, pending asynchronous calls — is represented by a `Slot`.
/// Dropping the slot performs exactly one deregistration on the owning
/// connection; after that no further callbacks associated with it are
/// invoked. A slot which outlives its connection unregisters nothing.
///
/// Call [`detach`] to make the registration *floating*: it is then owned by
/// the connection and lives as long as it does.
///
/// [`detach`]: Self::detach
#[must_use = "dropping a slot immediately unregisters it"]
pub struct Slot {
    conn: Weak<Inner>,
    kind: SlotKind,
    id: u64,
    armed: bool,
}

impl Slot {
    pub(crate) fn new(conn: Weak<Inner>, kind: SlotKind, id: u64) -> Self {
        Self {
            conn,
            kind,
            id,
            armed: true,
        }
    }

    /// Transfer ownership of the registration to the connection, keeping it
    /// alive for as long as the connection lives.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Some(inner) = self.conn.upgrade() {
            inner.unregister(self.kind, self.id);
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}
