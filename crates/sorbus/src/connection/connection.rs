use std::os::unix::net::UnixStream;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{name, Error, Result};
use crate::match_rule::MatchRule;
use crate::object::{RegisteredInterface, VTable};
use crate::org_freedesktop_dbus::{self, NameFlag, NameReply, ReleaseNameReply};
use crate::slot::SlotKind;
use crate::transport::Transport;
use crate::{sasl, Message, ObjectPath, Serial, Slot};

use super::event::{now_usec, PollData, NO_TIMEOUT};
use super::future::MessageFuture;
use super::inner::{Inner, MatchEntry, VTableEntry};
use super::pending::{AsyncShared, PendingKind};

/// The life stage of a connection's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoopState {
    /// No loop has been started or attached.
    None,
    /// The application drives the loop itself, either by blocking in
    /// [`enter_event_loop`] or by calling [`process_pending`].
    ///
    /// [`enter_event_loop`]: Connection::enter_event_loop
    /// [`process_pending`]: Connection::process_pending
    ExternallyDriven,
    /// An internally managed thread runs the loop.
    InternalThreadRunning,
    /// The connection's descriptor and timeout are registered with an
    /// external reactor through [`poll_data`].
    ///
    /// [`poll_data`]: Connection::poll_data
    AttachedToExternalLoop,
    /// The loop has been left and will not run again on this connection.
    Exited,
}

/// The public handle layer. When the last public handle drops, the loop
/// thread is stopped and joined; the engine state itself lives on until the
/// loop thread has let go of it.
struct Handle {
    inner: Arc<Inner>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.inner.exited.store(true, Ordering::SeqCst);
        self.inner.wake.wake();

        let thread = {
            let mut state = self.inner.lock_state();
            state.loop_state = EventLoopState::Exited;
            state.loop_thread.take()
        };

        if let Some(thread) = thread {
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }

        self.inner.fail_all_pending();
    }
}

/// A connection to a D-Bus bus, or directly to a peer.
///
/// The connection owns the bus handle and incorporates the I/O event loop
/// which dispatches incoming messages: run it on an internal thread with
/// [`enter_event_loop_async`], block the calling thread with
/// [`enter_event_loop`], or integrate with an external reactor through
/// [`poll_data`] and [`process_pending`].
///
/// Cloning is cheap and yields another handle to the same connection.
///
/// [`enter_event_loop_async`]: Self::enter_event_loop_async
/// [`enter_event_loop`]: Self::enter_event_loop
/// [`poll_data`]: Self::poll_data
/// [`process_pending`]: Self::process_pending
#[derive(Clone)]
pub struct Connection {
    handle: Arc<Handle>,
}

impl Connection {
    fn open(transport: Transport, is_bus: bool) -> Result<Self> {
        let inner = Arc::new(Inner::new(transport, is_bus)?);

        let this = Self {
            handle: Arc::new(Handle { inner }),
        };

        if is_bus {
            this.hello()?;
        }

        Ok(this)
    }

    fn open_bus(mut transport: Transport) -> Result<Self> {
        sasl::client_handshake(&mut transport)?;
        Self::open(transport, true)
    }

    /// Open a connection to the session bus.
    pub fn session() -> Result<Self> {
        Self::open_bus(Transport::session_bus()?)
    }

    /// Open a connection to the system bus.
    pub fn system() -> Result<Self> {
        Self::open_bus(Transport::system_bus()?)
    }

    /// Open a connection to the session bus when running in a user context
    /// and to the system bus otherwise.
    pub fn default_bus() -> Result<Self> {
        if Transport::session_bus_available() {
            Self::session()
        } else {
            Self::system()
        }
    }

    /// Open a connection to a bus at an explicit address, e.g.
    /// `unix:path=/run/user/1000/bus`.
    pub fn with_address(address: &str) -> Result<Self> {
        Self::open_bus(Transport::with_address(address)?)
    }

    /// Open a connection to the system bus of a remote host over ssh.
    pub fn remote_system(host: &str) -> Result<Self> {
        Self::open_bus(Transport::remote_system_bus(host)?)
    }

    /// Open a direct, brokerless connection to a peer listening at the
    /// given address.
    pub fn direct(address: &str) -> Result<Self> {
        let mut transport = Transport::with_address(address)?;
        sasl::client_handshake(&mut transport)?;
        Self::open(transport, false)
    }

    /// Open a direct, brokerless connection over an already connected
    /// stream, authenticating as the client side.
    pub fn direct_from_stream(stream: UnixStream) -> Result<Self> {
        let mut transport = Transport::from_stream(stream);
        sasl::client_handshake(&mut transport)?;
        Self::open(transport, false)
    }

    /// Serve one direct peer over an already connected stream, running the
    /// server side of the authentication handshake.
    pub fn server(stream: UnixStream) -> Result<Self> {
        let mut transport = Transport::from_stream(stream);
        let guid = server_guid();
        sasl::server_handshake(&mut transport, &guid)?;
        Self::open(transport, false)
    }

    /// Construct a pair of directly connected in-process endpoints, one
    /// authenticated as the server and one as the client.
    ///
    /// This is the backbone for tests and for same-process client/server
    /// setups that do not want a bus in between.
    pub fn direct_pair() -> Result<(Self, Self)> {
        let (client_stream, server_stream) = UnixStream::pair()?;

        let server = thread::Builder::new()
            .name("sorbus-pair".into())
            .spawn(move || Self::server(server_stream))
            .map_err(Error::from)?;

        let client = Self::direct_from_stream(client_stream)?;

        let server = server
            .join()
            .map_err(|_| Error::failed("server handshake thread panicked"))??;

        Ok((client, server))
    }

    pub(crate) fn inner(&self) -> &Arc<Inner> {
        &self.handle.inner
    }

    /// Call `Hello()` on the bus driver and record the unique name.
    fn hello(&self) -> Result<()> {
        let message = self.create_method_call(
            org_freedesktop_dbus::DESTINATION,
            org_freedesktop_dbus::PATH,
            org_freedesktop_dbus::INTERFACE,
            "Hello",
        )?;

        let mut reply = self.call(message, None)?;
        let unique = reply.read::<String>()?;
        log::debug!("connected to bus as {unique}");

        let mut state = self.inner().lock_state();
        state.unique_name = Some(unique);
        Ok(())
    }

    /// The unique bus name of this connection, e.g. `:1.42`. Absent on
    /// direct connections.
    pub fn unique_name(&self) -> Option<String> {
        self.inner().lock_state().unique_name.clone()
    }

    /// Request a well-known name on the bus, without queueing behind an
    /// existing owner.
    pub fn request_name(&self, name_: &str) -> Result<()> {
        match self.request_name_with_flags(name_, NameFlag::DO_NOT_QUEUE)? {
            NameReply::PRIMARY_OWNER | NameReply::ALREADY_OWNER => {
                let mut state = self.inner().lock_state();
                state.names.push(name_.to_string());
                Ok(())
            }
            reply => Err(Error::failed(format!(
                "could not acquire name {name_}: {reply:?}"
            ))),
        }
    }

    /// Request a well-known name with explicit flags, surfacing the raw
    /// reply.
    pub fn request_name_with_flags(&self, name_: &str, flags: NameFlag) -> Result<NameReply> {
        self.check_bus()?;

        let mut message = self.create_method_call(
            org_freedesktop_dbus::DESTINATION,
            org_freedesktop_dbus::PATH,
            org_freedesktop_dbus::INTERFACE,
            "RequestName",
        )?;

        message.append(&name_.to_string())?;
        message.append(&flags.raw())?;

        let mut reply = self.call(message, None)?;
        Ok(NameReply::from_raw(reply.read::<u32>()?))
    }

    /// Release a well-known name previously requested on the bus.
    pub fn release_name(&self, name_: &str) -> Result<()> {
        self.check_bus()?;

        let mut message = self.create_method_call(
            org_freedesktop_dbus::DESTINATION,
            org_freedesktop_dbus::PATH,
            org_freedesktop_dbus::INTERFACE,
            "ReleaseName",
        )?;

        message.append(&name_.to_string())?;

        let mut reply = self.call(message, None)?;

        match ReleaseNameReply::from_raw(reply.read::<u32>()?) {
            ReleaseNameReply::RELEASED => {
                let mut state = self.inner().lock_state();
                state.names.retain(|n| n != name_);
                Ok(())
            }
            ReleaseNameReply::NON_EXISTENT => Err(Error::new(
                name::NAME_HAS_NO_OWNER,
                format!("name {name_} has no owner"),
            )),
            reply => Err(Error::failed(format!(
                "could not release name {name_}: {reply:?}"
            ))),
        }
    }

    /// Set the connection-wide method call timeout. Individual calls may
    /// override it; a zero duration restores the engine default.
    pub fn set_method_call_timeout(&self, timeout: Duration) {
        let mut state = self.inner().lock_state();

        state.method_timeout_usec = if timeout.is_zero() {
            None
        } else {
            Some(timeout.as_micros().min(u64::MAX as u128) as u64)
        };
    }

    /// The connection-wide method call timeout, or `None` when the engine
    /// default applies.
    pub fn method_call_timeout(&self) -> Option<Duration> {
        let state = self.inner().lock_state();
        state.method_timeout_usec.map(Duration::from_micros)
    }

    /// Construct a method call message addressed to `destination`.
    pub fn create_method_call(
        &self,
        destination: &str,
        path: impl AsRef<[u8]>,
        interface: &str,
        member: &str,
    ) -> Result<Message> {
        let path = ObjectPath::new(path.as_ref())?;

        let mut message = Message::method_call(path, member).with_interface(interface);

        if !destination.is_empty() {
            message = message.with_destination(destination);
        }

        Ok(message)
    }

    /// Construct a signal message emitted from `path`.
    pub fn create_signal(
        &self,
        path: impl AsRef<[u8]>,
        interface: &str,
        member: &str,
    ) -> Result<Message> {
        let path = ObjectPath::new(path.as_ref())?;
        Ok(Message::signal(path, interface, member))
    }

    /// Send a message without waiting for a reply. The message is sealed if
    /// it has not been already; the assigned serial is returned.
    pub fn send(&self, message: Message) -> Result<Serial> {
        self.inner().queue_message(message)
    }

    /// Send a method call and block until its reply, an error reply, or the
    /// timeout.
    ///
    /// A timeout of `None` (or zero) applies the connection default. The
    /// calling thread drives the connection itself when no event loop does;
    /// calling into the same connection from one of its own handlers
    /// deadlocks until the timeout expires.
    pub fn call(&self, message: Message, timeout: Option<Duration>) -> Result<Message> {
        let inner = self.inner();
        let deadline = inner.call_deadline(timeout.map(|t| t.as_micros() as u64));

        let (sender, receiver) = mpsc::channel();
        inner.queue_with_reply(message, PendingKind::Sync(sender), deadline)?;

        loop {
            match receiver.try_recv() {
                Ok(result) => return result,
                Err(mpsc::TryRecvError::Disconnected) => {
                    return Err(Error::new(name::DISCONNECTED, "connection is closed"));
                }
                Err(mpsc::TryRecvError::Empty) => {}
            }

            if inner.is_disconnected() {
                inner.fail_all_pending();
                continue;
            }

            if let Ok(_guard) = inner.driver.try_lock() {
                inner.drive_once(deadline)?;
            } else {
                // Somebody else is driving; wait for them to hand over the
                // reply, re-checking periodically in case they stop.
                match receiver.recv_timeout(Duration::from_millis(50)) {
                    Ok(result) => return result,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        return Err(Error::new(name::DISCONNECTED, "connection is closed"));
                    }
                }
            }
        }
    }

    /// Send a method call and deliver the result to `callback` once it
    /// arrives, from whichever thread drives the connection.
    ///
    /// The returned [`Slot`] cancels the call when dropped; a cancelled
    /// call never invokes the callback.
    pub fn call_async<F>(
        &self,
        message: Message,
        callback: F,
        timeout: Option<Duration>,
    ) -> Result<Slot>
    where
        F: FnOnce(Result<Message>) + Send + 'static,
    {
        let (slot, _) = self.call_async_tracked(message, callback, timeout)?;
        Ok(slot)
    }

    /// Like [`call_async`], additionally handing out the shared call state
    /// so the caller can observe and cancel it.
    ///
    /// [`call_async`]: Self::call_async
    pub(crate) fn call_async_tracked<F>(
        &self,
        message: Message,
        callback: F,
        timeout: Option<Duration>,
    ) -> Result<(Slot, super::AsyncSharedHandle)>
    where
        F: FnOnce(Result<Message>) + Send + 'static,
    {
        let inner = self.inner();
        let deadline = inner.call_deadline(timeout.map(|t| t.as_micros() as u64));

        let shared = Arc::new(AsyncShared::new(Box::new(callback)));
        let serial =
            inner.queue_with_reply(message, PendingKind::Async(Arc::clone(&shared)), deadline)?;

        let slot = Slot::new(
            Arc::downgrade(inner),
            SlotKind::PendingCall,
            u64::from(serial.get()),
        );

        Ok((slot, shared))
    }

    /// Send a method call and obtain a future resolving to its result.
    pub fn call_with_future(
        &self,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<MessageFuture> {
        let (mut future, complete) = MessageFuture::new();
        let slot = self.call_async(message, complete, timeout)?;
        future.attach_slot(slot);
        Ok(future)
    }

    /// Install a match rule and a handler invoked for every inbound message
    /// matching it.
    ///
    /// On bus connections the rule is also installed at the broker, and the
    /// call blocks until the broker confirms it.
    pub fn add_match<F>(&self, rule: &str, handler: F) -> Result<Slot>
    where
        F: FnMut(&mut Message) -> Result<()> + Send + 'static,
    {
        let slot = self.register_match(rule, handler)?;

        if self.inner().is_bus {
            if let Err(error) = self.call(self.add_match_message(rule)?, None) {
                return Err(error);
            }
        }

        Ok(slot)
    }

    /// Install a match rule without blocking on broker confirmation;
    /// `installed` is invoked once the broker has confirmed (immediately on
    /// direct connections).
    pub fn add_match_async<F, G>(&self, rule: &str, installed: G, handler: F) -> Result<Slot>
    where
        F: FnMut(&mut Message) -> Result<()> + Send + 'static,
        G: FnOnce(Result<()>) + Send + 'static,
    {
        let slot = self.register_match(rule, handler)?;

        if self.inner().is_bus {
            let confirm = self.call_async(
                self.add_match_message(rule)?,
                move |result| installed(result.map(|_| ())),
                None,
            )?;

            // The confirmation tracking lives as long as the connection.
            confirm.detach();
        } else {
            installed(Ok(()));
        }

        Ok(slot)
    }

    /// Install a match rule owned by the connection itself, kept for as
    /// long as the connection lives.
    pub fn add_match_floating<F>(&self, rule: &str, handler: F) -> Result<()>
    where
        F: FnMut(&mut Message) -> Result<()> + Send + 'static,
    {
        self.add_match(rule, handler)?.detach();
        Ok(())
    }

    fn register_match<F>(&self, rule: &str, handler: F) -> Result<Slot>
    where
        F: FnMut(&mut Message) -> Result<()> + Send + 'static,
    {
        let parsed = MatchRule::parse(rule)?;
        let inner = self.inner();
        let id = inner.next_id();

        {
            let mut state = inner.lock_state();
            state.matches.push(MatchEntry {
                id,
                rule: parsed,
                handler: Arc::new(Mutex::new(Box::new(handler))),
            });
        }

        Ok(Slot::new(Arc::downgrade(inner), SlotKind::Match, id))
    }

    fn add_match_message(&self, rule: &str) -> Result<Message> {
        let mut message = self.create_method_call(
            org_freedesktop_dbus::DESTINATION,
            org_freedesktop_dbus::PATH,
            org_freedesktop_dbus::INTERFACE,
            "AddMatch",
        )?;

        message.append(&rule.to_string())?;
        Ok(message)
    }

    /// Register a [`VTable`] for the given (object path, interface) pair.
    ///
    /// This is the primitive registration [`Object`] builds on. The vtable
    /// is active until the returned slot is dropped.
    ///
    /// [`Object`]: crate::Object
    pub fn add_object_vtable(
        &self,
        path: impl AsRef<[u8]>,
        interface: &str,
        vtable: VTable,
    ) -> Result<Slot> {
        let path = ObjectPath::new(path.as_ref())?.to_owned();
        let inner = self.inner();
        let id = inner.next_id();

        {
            let mut state = inner.lock_state();

            let duplicate = state
                .vtables
                .iter()
                .any(|entry| entry.path == path && entry.interface.name() == interface);

            if duplicate {
                return Err(Error::failed(format!(
                    "interface {interface} is already registered at {path}"
                )));
            }

            state.vtables.push(VTableEntry {
                id,
                path,
                interface: Arc::new(RegisteredInterface::new(interface, vtable)),
            });
        }

        Ok(Slot::new(Arc::downgrade(inner), SlotKind::VTable, id))
    }

    /// Register an object manager at the given path, enabling
    /// `GetManagedObjects` and the `InterfacesAdded`/`InterfacesRemoved`
    /// signals for objects underneath it.
    pub fn add_object_manager(&self, path: impl AsRef<[u8]>) -> Result<Slot> {
        let path = ObjectPath::new(path.as_ref())?.to_owned();
        let inner = self.inner();
        let id = inner.next_id();

        {
            let mut state = inner.lock_state();
            state.object_managers.push((id, path));
        }

        Ok(Slot::new(
            Arc::downgrade(inner),
            SlotKind::ObjectManager,
            id,
        ))
    }

    /// Enter the I/O event loop on the calling thread, dispatching incoming
    /// messages until [`leave_event_loop`] is called. Once the loop has
    /// been left it cannot be re-entered; subsequent calls return
    /// immediately.
    ///
    /// [`leave_event_loop`]: Self::leave_event_loop
    pub fn enter_event_loop(&self) -> Result<()> {
        let inner = self.inner();

        {
            let mut state = inner.lock_state();

            if matches!(state.loop_state, EventLoopState::None) {
                state.loop_state = EventLoopState::ExternallyDriven;
            }
        }

        let result = run_loop(inner);

        let mut state = inner.lock_state();
        state.loop_state = EventLoopState::Exited;
        result
    }

    /// Run the I/O event loop on an internally managed thread.
    pub fn enter_event_loop_async(&self) -> Result<()> {
        let inner = self.inner();

        {
            let state = inner.lock_state();

            if matches!(state.loop_state, EventLoopState::InternalThreadRunning) {
                return Ok(());
            }
        }

        let loop_inner = Arc::clone(inner);

        let thread = thread::Builder::new()
            .name("sorbus-loop".into())
            .spawn(move || {
                if let Err(error) = run_loop(&loop_inner) {
                    log::warn!("event loop exited with an error: {error}");
                }

                let mut state = loop_inner.lock_state();
                state.loop_state = EventLoopState::Exited;
            })
            .map_err(Error::from)?;

        let mut state = inner.lock_state();
        state.loop_state = EventLoopState::InternalThreadRunning;
        state.loop_thread = Some(thread);
        Ok(())
    }

    /// Leave the I/O event loop running on this connection.
    ///
    /// Idempotent and race-safe: the loop is interrupted through the wake
    /// pipe, and the internal loop thread (if any) is joined unless this is
    /// called from within it.
    pub fn leave_event_loop(&self) -> Result<()> {
        let inner = self.inner();
        inner.exited.store(true, Ordering::SeqCst);
        inner.wake.wake();

        let thread = {
            let mut state = inner.lock_state();
            state.loop_state = EventLoopState::Exited;
            state.loop_thread.take()
        };

        if let Some(thread) = thread {
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }

        Ok(())
    }

    /// The current event loop state.
    pub fn event_loop_state(&self) -> EventLoopState {
        self.inner().lock_state().loop_state
    }

    /// The descriptor, poll events and absolute timeout an external event
    /// loop should use to drive this connection.
    pub fn poll_data(&self) -> PollData {
        let inner = self.inner();

        let mut events = libc::POLLIN;

        {
            let state = inner.lock_state();

            if !state.send_queue.is_empty() {
                events |= libc::POLLOUT;
            }
        }

        PollData {
            fd: inner.fd(),
            events,
            timeout_usec: inner.earliest_deadline(),
        }
    }

    /// Register the connection with an external reactor.
    ///
    /// Marks the loop state accordingly and returns the initial
    /// [`PollData`]; the reactor then calls [`process_pending`] on
    /// readiness and re-queries [`poll_data`] after draining.
    ///
    /// [`process_pending`]: Self::process_pending
    /// [`poll_data`]: Self::poll_data
    pub fn attach_external_loop(&self) -> Result<PollData> {
        let inner = self.inner();

        {
            let mut state = inner.lock_state();

            if matches!(
                state.loop_state,
                EventLoopState::InternalThreadRunning | EventLoopState::Exited
            ) {
                return Err(Error::failed(
                    "an event loop is already running on this connection",
                ));
            }

            state.loop_state = EventLoopState::AttachedToExternalLoop;
        }

        Ok(self.poll_data())
    }

    /// Drain one unit of work without blocking.
    ///
    /// Returns `true` when something was processed and it is worth calling
    /// again before polling, `false` when the caller should poll for I/O
    /// first.
    pub fn process_pending(&self) -> Result<bool> {
        let inner = self.inner();

        {
            let mut state = inner.lock_state();

            if matches!(state.loop_state, EventLoopState::None) {
                state.loop_state = EventLoopState::ExternallyDriven;
            }
        }

        let Ok(_guard) = inner.driver.try_lock() else {
            return Ok(false);
        };

        inner.process_one()
    }

    fn check_bus(&self) -> Result<()> {
        if !self.inner().is_bus {
            return Err(Error::new(
                name::NOT_SUPPORTED,
                "operation requires a bus connection",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("fd", &self.inner().fd())
            .field("is_bus", &self.inner().is_bus)
            .field("unique_name", &self.unique_name())
            .finish()
    }
}

/// Drive the connection until it exits or disconnects.
fn run_loop(inner: &Arc<Inner>) -> Result<()> {
    loop {
        if inner.exited.load(Ordering::SeqCst) {
            return Ok(());
        }

        if inner.is_disconnected() {
            inner.fail_all_pending();
            return Ok(());
        }

        let _guard = inner.driver.lock().expect("driver lock");
        inner.drive_once(NO_TIMEOUT)?;
    }
}

/// Produce the 32-hex-digit server guid sent in the authentication
/// handshake.
fn server_guid() -> String {
    let now = now_usec();
    let pid = std::process::id();
    let mix = now.wrapping_mul(0x9e37_79b9_7f4a_7c15) as u32;
    format!("{now:016x}{pid:08x}{mix:08x}")
}
