use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::AsyncSharedHandle;
use crate::error::Result;
use crate::{Connection, Message, ObjectPathBuf, Slot, Variant};

use super::invoker::{AsyncMethodInvoker, MethodInvoker};
use super::properties::{PropertyGetter, PropertySetter};
use super::signals::SignalSubscriber;

pub(crate) struct PendingCall {
    pub(crate) shared: AsyncSharedHandle,
    /// Keeps the engine-level pending registration alive; dropping it
    /// cancels the call.
    pub(crate) _slot: Slot,
}

#[derive(Default)]
pub(crate) struct ProxyState {
    /// Signal subscriptions owned by the proxy, keyed by (interface,
    /// member) to refuse duplicates.
    pub(crate) signal_slots: HashMap<(String, String), Slot>,
    /// In-flight asynchronous calls, keyed by a monotonic per-proxy id.
    pub(crate) pending: HashMap<u64, PendingCall>,
    pub(crate) next_call: u64,
}

pub(crate) struct ProxyInner {
    /// Declared before `conn` so subscriptions and pending calls release
    /// while the connection is still alive.
    pub(crate) state: Mutex<ProxyState>,
    pub(crate) conn: Connection,
    pub(crate) destination: Box<str>,
    pub(crate) path: ObjectPathBuf,
}

impl ProxyInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().expect("proxy state lock")
    }
}

/// A client-side facade around one remote object: a (destination, object
/// path, connection) tuple through which methods are called, properties
/// accessed and signals subscribed.
///
/// # Examples
///
/// ```no_run
/// use sorbus::{Connection, Proxy};
///
/// let connection = Connection::session()?;
///
/// let proxy = Proxy::new(
///     &connection,
///     "org.freedesktop.DBus",
///     "/org/freedesktop/DBus",
/// )?;
///
/// let id: (String,) = proxy
///     .call_method("GetId")
///     .on_interface("org.freedesktop.DBus")
///     .get()?;
/// # Ok::<_, sorbus::Error>(())
/// ```
#[derive(Clone)]
pub struct Proxy {
    pub(crate) inner: Arc<ProxyInner>,
}

impl Proxy {
    fn build(conn: Connection, destination: &str, path: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(ProxyInner {
                state: Mutex::new(ProxyState::default()),
                conn,
                destination: destination.into(),
                path: ObjectPathBuf::new(path.as_ref())?,
            }),
        })
    }

    /// Construct a proxy borrowing an existing connection. The caller is
    /// responsible for running an event loop on it (or for only using the
    /// synchronous parts of the proxy).
    ///
    /// Pass an empty destination on direct peer-to-peer connections.
    pub fn new(conn: &Connection, destination: &str, path: impl AsRef<[u8]>) -> Result<Self> {
        Self::build(conn.clone(), destination, path)
    }

    /// Construct a proxy taking ownership of the connection and starting
    /// the internal event loop thread on it, so that signals and
    /// asynchronous replies are delivered without further ceremony.
    pub fn with_connection(
        conn: Connection,
        destination: &str,
        path: impl AsRef<[u8]>,
    ) -> Result<Self> {
        conn.enter_event_loop_async()?;
        Self::build(conn, destination, path)
    }

    /// Construct a proxy taking ownership of the connection without
    /// starting an event loop thread, for purely synchronous callers.
    pub fn without_event_loop(
        conn: Connection,
        destination: &str,
        path: impl AsRef<[u8]>,
    ) -> Result<Self> {
        Self::build(conn, destination, path)
    }

    /// The connection the proxy talks over.
    pub fn connection(&self) -> &Connection {
        &self.inner.conn
    }

    /// The destination bus name of the remote object.
    pub fn destination(&self) -> &str {
        &self.inner.destination
    }

    /// The path of the remote object.
    pub fn path(&self) -> &crate::ObjectPath {
        &self.inner.path
    }

    /// Construct the method call message an invoker sends.
    pub(crate) fn build_call(&self, interface: Option<&str>, member: &str) -> Message {
        let mut message = Message::method_call(&self.inner.path, member);

        if let Some(interface) = interface {
            message = message.with_interface(interface);
        }

        if !self.inner.destination.is_empty() {
            message = message.with_destination(&*self.inner.destination);
        }

        message
    }

    /// Start a synchronous method invocation.
    pub fn call_method(&self, member: &str) -> MethodInvoker<'_> {
        MethodInvoker::new(self, member)
    }

    /// Start an asynchronous method invocation, completed through a
    /// callback or a future.
    pub fn call_method_async(&self, member: &str) -> AsyncMethodInvoker<'_> {
        AsyncMethodInvoker::new(self, member)
    }

    /// Start a signal subscription scoped to this proxy's destination and
    /// path.
    pub fn subscribe_signal(&self, member: &str) -> SignalSubscriber<'_> {
        SignalSubscriber::new(self, member)
    }

    /// Start reading a property.
    pub fn get_property(&self, property: &str) -> PropertyGetter<'_> {
        PropertyGetter::new(self, property)
    }

    /// Start writing a property.
    pub fn set_property(&self, property: &str) -> PropertySetter<'_> {
        PropertySetter::new(self, property)
    }

    /// Fetch every readable property of the given interface.
    pub fn get_all_properties(
        &self,
        interface: &str,
    ) -> Result<HashMap<String, Variant>> {
        self.call_method("GetAll")
            .on_interface(crate::org_freedesktop_dbus::PROPERTIES)
            .with_arguments(&(interface.to_string(),))?
            .get::<(HashMap<String, Variant>,)>()
            .map(|(map,)| map)
    }

    /// Cancel every pending asynchronous call and drop every signal
    /// subscription, leaving the connection itself alive.
    pub fn unregister(&self) {
        let (pending, slots) = {
            let mut state = self.inner.lock_state();
            let pending: Vec<_> = state.pending.drain().map(|(_, call)| call).collect();
            let slots: Vec<_> = state.signal_slots.drain().map(|(_, slot)| slot).collect();
            (pending, slots)
        };

        for call in &pending {
            call.shared.cancel();
        }

        drop(pending);
        drop(slots);
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let mut state = self.state.lock().expect("proxy state lock");

        for (_, call) in state.pending.drain() {
            call.shared.cancel();
            drop(call);
        }

        state.signal_slots.clear();
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("destination", &self.inner.destination)
            .field("path", &self.inner.path)
            .finish()
    }
}
