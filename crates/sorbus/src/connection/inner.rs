use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::{name, Error, Result};
use crate::match_rule::MatchRule;
use crate::object::RegisteredInterface;
use crate::transport::Transport;
use crate::wire::{decode_message, encode_message, RawHeader, HEADER_SIZE};
use crate::{Message, MessageKind, ObjectPath, ObjectPathBuf, Serial};

use super::connection::EventLoopState;
use super::event::{now_usec, WakePipe, NO_TIMEOUT};
use super::pending::{reply_to_result, Pending, PendingKind};
use crate::slot::SlotKind;

/// The engine default method call timeout.
pub(crate) const DEFAULT_METHOD_TIMEOUT_USEC: u64 = 25_000_000;

pub(crate) type MatchHandler = Box<dyn FnMut(&mut Message) -> Result<()> + Send>;

pub(crate) struct MatchEntry {
    pub(crate) id: u64,
    pub(crate) rule: MatchRule,
    pub(crate) handler: Arc<Mutex<MatchHandler>>,
}

pub(crate) struct VTableEntry {
    pub(crate) id: u64,
    pub(crate) path: ObjectPathBuf,
    pub(crate) interface: Arc<RegisteredInterface>,
}

pub(crate) struct State {
    serial: u32,
    pub(crate) unique_name: Option<String>,
    pub(crate) send_queue: VecDeque<Vec<u8>>,
    send_offset: usize,
    recv: Vec<u8>,
    pub(crate) pending: HashMap<u32, Pending>,
    pub(crate) matches: Vec<MatchEntry>,
    pub(crate) vtables: Vec<VTableEntry>,
    pub(crate) object_managers: Vec<(u64, ObjectPathBuf)>,
    pub(crate) names: Vec<String>,
    pub(crate) method_timeout_usec: Option<u64>,
    pub(crate) loop_state: EventLoopState,
    pub(crate) loop_thread: Option<JoinHandle<()>>,
    next_id: u64,
}

/// The shared engine state behind a [`Connection`].
///
/// [`Connection`]: crate::Connection
pub(crate) struct Inner {
    /// The transport, locked for the duration of individual reads and
    /// writes only.
    transport: Mutex<Transport>,
    /// Cached transport descriptor for polling without taking the lock.
    fd: RawFd,
    pub(crate) wake: WakePipe,
    /// Exclusive right to poll and dispatch. Whoever holds it is "the
    /// event loop" for the time being.
    pub(crate) driver: Mutex<()>,
    pub(crate) state: Mutex<State>,
    /// Whether this connection talks to a bus (as opposed to a direct
    /// peer), and therefore has a unique name and a bus driver to talk to.
    pub(crate) is_bus: bool,
    /// One-way flag set by `leave_event_loop`.
    pub(crate) exited: AtomicBool,
    /// Set when the peer goes away.
    disconnected: AtomicBool,
}

impl Inner {
    pub(crate) fn new(transport: Transport, is_bus: bool) -> Result<Self> {
        use std::os::fd::AsRawFd;

        transport.set_nonblocking(true)?;
        let fd = transport.as_raw_fd();

        Ok(Self {
            transport: Mutex::new(transport),
            fd,
            wake: WakePipe::new()?,
            driver: Mutex::new(()),
            state: Mutex::new(State {
                serial: 0,
                unique_name: None,
                send_queue: VecDeque::new(),
                send_offset: 0,
                recv: Vec::new(),
                pending: HashMap::new(),
                matches: Vec::new(),
                vtables: Vec::new(),
                object_managers: Vec::new(),
                names: Vec::new(),
                method_timeout_usec: None,
                loop_state: EventLoopState::None,
                loop_thread: None,
                next_id: 0,
            }),
            is_bus,
            exited: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        })
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub(crate) fn next_id(&self) -> u64 {
        let mut state = self.lock_state();
        state.next_id += 1;
        state.next_id
    }

    pub(crate) fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("connection state lock")
    }

    fn alloc_serial(state: &mut State) -> Serial {
        loop {
            state.serial = state.serial.wrapping_add(1);

            if let Some(serial) = std::num::NonZeroU32::new(state.serial) {
                break Serial::new(serial);
            }
        }
    }

    /// Seal and enqueue a message without tracking a reply.
    pub(crate) fn queue_message(&self, mut message: Message) -> Result<Serial> {
        self.check_connected()?;

        if !message.is_sealed() {
            message.seal()?;
        }

        let serial = {
            let mut state = self.lock_state();
            Self::alloc_serial(&mut state)
        };

        message.set_serial(serial);
        let bytes = encode_message(&message)?;

        {
            let mut state = self.lock_state();
            state.send_queue.push_back(bytes);
        }

        let _ = self.try_flush()?;
        self.wake.wake();
        Ok(serial)
    }

    /// Seal and enqueue a method call, registering the pending reply before
    /// any byte leaves so the reply cannot race the registration.
    pub(crate) fn queue_with_reply(
        &self,
        mut message: Message,
        kind: PendingKind,
        deadline_usec: u64,
    ) -> Result<Serial> {
        self.check_connected()?;

        if !message.is_sealed() {
            message.seal()?;
        }

        let serial = {
            let mut state = self.lock_state();
            Self::alloc_serial(&mut state)
        };

        message.set_serial(serial);
        let bytes = encode_message(&message)?;

        {
            let mut state = self.lock_state();
            state.pending.insert(
                serial.get(),
                Pending {
                    deadline_usec,
                    kind,
                },
            );
            state.send_queue.push_back(bytes);
        }

        let _ = self.try_flush()?;
        self.wake.wake();
        Ok(serial)
    }

    /// The method call deadline applied when the caller does not override
    /// it, in absolute microseconds.
    pub(crate) fn call_deadline(&self, timeout_usec: Option<u64>) -> u64 {
        let timeout = match timeout_usec {
            Some(0) | None => {
                let state = self.lock_state();
                state.method_timeout_usec.unwrap_or(DEFAULT_METHOD_TIMEOUT_USEC)
            }
            Some(timeout) => timeout,
        };

        now_usec().saturating_add(timeout)
    }

    /// Write queued bytes without blocking. Returns whether everything
    /// queued has been flushed.
    pub(crate) fn try_flush(&self) -> Result<bool> {
        loop {
            let chunk = {
                let state = self.lock_state();

                let Some(front) = state.send_queue.front() else {
                    return Ok(true);
                };

                front[state.send_offset..].to_vec()
            };

            let written = {
                let mut transport = self.transport.lock().expect("transport lock");

                match transport.write(&chunk) {
                    Ok(n) => n,
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        return Ok(false);
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(error) => {
                        self.mark_disconnected();
                        return Err(error.into());
                    }
                }
            };

            let mut state = self.lock_state();
            state.send_offset += written;

            let done = state
                .send_queue
                .front()
                .map(|front| state.send_offset >= front.len())
                .unwrap_or(true);

            if done {
                state.send_queue.pop_front();
                state.send_offset = 0;
            }
        }
    }

    /// Read whatever is available without blocking.
    fn read_available(&self) -> Result<bool> {
        let mut any = false;
        let mut buf = [0u8; 4096];

        loop {
            let n = {
                let mut transport = self.transport.lock().expect("transport lock");

                match transport.read(&mut buf) {
                    Ok(n) => n,
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(error) => {
                        self.mark_disconnected();
                        return Err(error.into());
                    }
                }
            };

            if n == 0 {
                self.mark_disconnected();
                break;
            }

            let mut state = self.lock_state();
            state.recv.extend_from_slice(&buf[..n]);
            any = true;
        }

        Ok(any)
    }

    /// Extract one complete message frame from the receive buffer.
    fn extract_one(&self) -> Result<Option<Message>> {
        let frame = {
            let mut state = self.lock_state();

            if state.recv.len() < HEADER_SIZE {
                return Ok(None);
            }

            let header = RawHeader::parse(&state.recv)?;
            let total = header.total_len();

            if state.recv.len() < total {
                return Ok(None);
            }

            let mut frame = state.recv.split_off(total);
            std::mem::swap(&mut frame, &mut state.recv);
            frame
        };

        Ok(Some(decode_message(&frame)?))
    }

    /// Drive one poll cycle. The caller must hold the driver lock.
    ///
    /// `wait_deadline_usec` bounds how long the poll may sleep; pending
    /// call deadlines shorten it further.
    pub(crate) fn drive_once(self: &Arc<Self>, wait_deadline_usec: u64) -> Result<()> {
        self.try_flush()?;

        // Dispatch whatever is already buffered before sleeping.
        let mut dispatched = false;

        while let Some(message) = self.extract_one()? {
            self.dispatch(message);
            dispatched = true;
        }

        self.expire_pending();

        if dispatched {
            return Ok(());
        }

        if self.is_disconnected() {
            self.fail_all_pending();
            return Ok(());
        }

        let deadline = self.earliest_deadline().min(wait_deadline_usec);

        let timeout_ms = if deadline == NO_TIMEOUT {
            -1
        } else {
            let now = now_usec();
            (deadline.saturating_sub(now) / 1_000).min(i32::MAX as u64) as i32
        };

        let mut events = libc::POLLIN;

        {
            let state = self.lock_state();

            if !state.send_queue.is_empty() {
                events |= libc::POLLOUT;
            }
        }

        let mut fds = [
            libc::pollfd {
                fd: self.fd,
                events,
                revents: 0,
            },
            libc::pollfd {
                fd: self.wake.read_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        // SAFETY: poll over two descriptors owned by this connection.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout_ms) };

        if rc < 0 {
            let error = std::io::Error::last_os_error();

            if error.kind() == std::io::ErrorKind::Interrupted {
                return Ok(());
            }

            return Err(error.into());
        }

        if fds[1].revents & libc::POLLIN != 0 {
            self.wake.drain();
        }

        if fds[0].revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            self.mark_disconnected();
        }

        if fds[0].revents & libc::POLLIN != 0 {
            self.read_available()?;
        }

        if fds[0].revents & libc::POLLOUT != 0 {
            self.try_flush()?;
        }

        while let Some(message) = self.extract_one()? {
            self.dispatch(message);
        }

        self.expire_pending();

        if self.is_disconnected() {
            self.fail_all_pending();
        }

        Ok(())
    }

    /// One non-blocking unit of work for externally driven loops. The
    /// caller must hold the driver lock.
    pub(crate) fn process_one(self: &Arc<Self>) -> Result<bool> {
        let flushed = {
            let state = self.lock_state();
            !state.send_queue.is_empty()
        } && self.try_flush()?;

        if self.expire_one() {
            return Ok(true);
        }

        if let Some(message) = self.extract_one()? {
            self.dispatch(message);
            return Ok(true);
        }

        self.read_available()?;

        if let Some(message) = self.extract_one()? {
            self.dispatch(message);
            return Ok(true);
        }

        if self.is_disconnected() {
            self.fail_all_pending();
        }

        Ok(flushed)
    }

    /// Route one inbound message.
    pub(crate) fn dispatch(self: &Arc<Self>, message: Message) {
        log::trace!(
            "dispatch: kind={:?} serial={:?} member={:?}",
            message.kind(),
            message.serial(),
            message.member()
        );

        self.run_matches(&message);

        match message.kind() {
            MessageKind::MethodReturn { reply_serial } | MessageKind::Error { reply_serial, .. } => {
                let pending = {
                    let mut state = self.lock_state();
                    state.pending.remove(&reply_serial.get())
                };

                if let Some(pending) = pending {
                    pending.complete(reply_to_result(message));
                }
            }
            MessageKind::MethodCall { .. } => {
                crate::object::dispatch_method_call(self, message);
            }
            _ => {}
        }
    }

    /// Run every registered match handler whose rule matches.
    fn run_matches(&self, message: &Message) {
        let handlers: Vec<_> = {
            let state = self.lock_state();
            state
                .matches
                .iter()
                .filter(|entry| entry.rule.matches(message))
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };

        for handler in handlers {
            let mut copy = message.clone();

            if copy.rewind(true).is_err() {
                continue;
            }

            let mut handler = handler.lock().expect("match handler lock");

            if let Err(error) = handler(&mut copy) {
                log::warn!("match handler failed: {error}");
            }
        }
    }

    /// The earliest pending-call deadline.
    pub(crate) fn earliest_deadline(&self) -> u64 {
        let state = self.lock_state();
        state
            .pending
            .values()
            .map(|pending| pending.deadline_usec)
            .min()
            .unwrap_or(NO_TIMEOUT)
    }

    /// Expire every overdue pending call.
    fn expire_pending(&self) {
        loop {
            if !self.expire_one() {
                break;
            }
        }
    }

    /// Expire at most one overdue pending call.
    fn expire_one(&self) -> bool {
        let now = now_usec();

        let expired = {
            let mut state = self.lock_state();

            let serial = state
                .pending
                .iter()
                .find(|(_, pending)| pending.deadline_usec <= now)
                .map(|(serial, _)| *serial);

            serial.and_then(|serial| state.pending.remove(&serial))
        };

        match expired {
            Some(pending) => {
                log::debug!("pending call expired");
                pending.complete(Err(Pending::timeout_error()));
                true
            }
            None => false,
        }
    }

    /// Fail every pending call after a disconnect.
    pub(crate) fn fail_all_pending(&self) {
        let pending: Vec<_> = {
            let mut state = self.lock_state();
            state.pending.drain().map(|(_, pending)| pending).collect()
        };

        for entry in pending {
            entry.complete(Err(Error::new(
                name::DISCONNECTED,
                "connection closed before a reply arrived",
            )));
        }
    }

    fn mark_disconnected(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            log::debug!("connection transport disconnected");
        }

        self.wake.wake();
    }

    fn check_connected(&self) -> Result<()> {
        if self.is_disconnected() {
            return Err(Error::new(name::DISCONNECTED, "connection is closed"));
        }

        Ok(())
    }

    /// Tear down one registration. Invoked from [`Slot::drop`].
    ///
    /// [`Slot::drop`]: crate::Slot
    pub(crate) fn unregister(&self, kind: SlotKind, id: u64) {
        match kind {
            SlotKind::Match => {
                let rule = {
                    let mut state = self.lock_state();

                    let rule = state
                        .matches
                        .iter()
                        .find(|entry| entry.id == id)
                        .map(|entry| entry.rule.to_string());

                    state.matches.retain(|entry| entry.id != id);
                    rule
                };

                // Uninstall the rule at the broker too; best effort, the
                // broker drops it with the connection anyway.
                if self.is_bus {
                    if let Some(rule) = rule {
                        let mut message = Message::method_call(
                            crate::org_freedesktop_dbus::PATH_OBJECT,
                            "RemoveMatch",
                        )
                        .with_interface(crate::org_freedesktop_dbus::INTERFACE)
                        .with_destination(crate::org_freedesktop_dbus::DESTINATION);

                        message.set_no_reply_expected(true);

                        let queued = message
                            .append(&rule)
                            .and_then(|()| self.queue_message(message));

                        if let Err(error) = queued {
                            log::debug!("failed to remove match at the broker: {error}");
                        }
                    }
                }
            }
            SlotKind::VTable => {
                let mut state = self.lock_state();
                state.vtables.retain(|entry| entry.id != id);
            }
            SlotKind::ObjectManager => {
                let mut state = self.lock_state();
                state.object_managers.retain(|(entry, _)| *entry != id);
            }
            SlotKind::PendingCall => {
                let pending = {
                    let mut state = self.lock_state();
                    state.pending.remove(&(id as u32))
                };

                if let Some(Pending {
                    kind: PendingKind::Async(shared),
                    ..
                }) = pending
                {
                    shared.cancel();
                }
            }
        }
    }

    // --------------------------------------------------------------
    // Registry snapshots used by the object dispatcher.
    // --------------------------------------------------------------

    /// The interfaces registered at exactly `path`.
    pub(crate) fn interfaces_at(&self, path: &ObjectPath) -> Vec<Arc<RegisteredInterface>> {
        let state = self.lock_state();
        state
            .vtables
            .iter()
            .filter(|entry| &*entry.path == path)
            .map(|entry| Arc::clone(&entry.interface))
            .collect()
    }

    /// The names of the direct child nodes underneath `path`, derived from
    /// every registered object path.
    pub(crate) fn child_names(&self, path: &ObjectPath) -> Vec<String> {
        let state = self.lock_state();
        let mut names = Vec::new();

        let base = path.as_str();

        for entry in &state.vtables {
            let child = entry.path.as_str();

            let rest = if base == "/" {
                child.strip_prefix('/')
            } else {
                child
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('/'))
            };

            let Some(rest) = rest else {
                continue;
            };

            if rest.is_empty() {
                continue;
            }

            let name = rest.split('/').next().unwrap_or(rest);

            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }

        names.sort();
        names
    }

    /// Test if an object manager is registered exactly at `path`.
    pub(crate) fn has_object_manager_at(&self, path: &ObjectPath) -> bool {
        let state = self.lock_state();
        state.object_managers.iter().any(|(_, base)| &**base == path)
    }

    /// The deepest object manager path registered at `path` or an ancestor
    /// of it.
    pub(crate) fn object_manager_base(&self, path: &ObjectPath) -> Option<ObjectPathBuf> {
        let state = self.lock_state();
        state
            .object_managers
            .iter()
            .filter(|(_, base)| path.is_inside(base))
            .max_by_key(|(_, base)| base.as_bytes().len())
            .map(|(_, base)| base.clone())
    }

    /// Every registered object path underneath `base`, without duplicates.
    pub(crate) fn managed_paths(&self, base: &ObjectPath) -> Vec<ObjectPathBuf> {
        let state = self.lock_state();
        let mut paths: Vec<ObjectPathBuf> = Vec::new();

        for entry in &state.vtables {
            if entry.path.is_inside(base) && !paths.iter().any(|path| *path == entry.path) {
                paths.push(entry.path.clone());
            }
        }

        paths.sort();
        paths
    }
}
