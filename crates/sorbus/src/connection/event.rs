use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// The `timeout_usec` value meaning "no timeout".
pub(crate) const NO_TIMEOUT: u64 = u64::MAX;

/// The current `CLOCK_MONOTONIC` time in microseconds.
pub(crate) fn now_usec() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: clock_gettime with a valid timespec pointer.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }

    (ts.tv_sec as u64) * 1_000_000 + (ts.tv_nsec as u64) / 1_000
}

/// What to hand to `poll(2)` when driving a connection from an external
/// event loop.
///
/// Returned by [`Connection::poll_data`]. When the descriptor signals any of
/// the events, or the timeout expires, call [`Connection::process_pending`]
/// until it returns `false`, then query again.
///
/// [`Connection::poll_data`]: crate::Connection::poll_data
/// [`Connection::process_pending`]: crate::Connection::process_pending
#[derive(Debug, Clone, Copy)]
pub struct PollData {
    /// The descriptor to be monitored.
    pub fd: RawFd,
    /// The `poll(2)` event mask to monitor `fd` with.
    pub events: i16,
    /// Absolute `CLOCK_MONOTONIC` timeout in microseconds; `u64::MAX` means
    /// no timeout and any past value means "poll immediately".
    pub timeout_usec: u64,
}

impl PollData {
    /// The timeout as a duration from now, or `None` when there is no
    /// timeout.
    pub fn relative_timeout(&self) -> Option<Duration> {
        if self.timeout_usec == NO_TIMEOUT {
            return None;
        }

        let now = now_usec();
        Some(Duration::from_micros(self.timeout_usec.saturating_sub(now)))
    }

    /// The timeout in the form `poll(2)` takes: `-1` for no timeout, `0` to
    /// poll without blocking, a positive number of milliseconds otherwise.
    pub fn poll_timeout_ms(&self) -> i32 {
        match self.relative_timeout() {
            None => -1,
            Some(timeout) => timeout.as_millis().min(i32::MAX as u128) as i32,
        }
    }
}

/// The self-pipe a connection's event loop polls next to the bus socket so
/// that [`leave_event_loop`] and fresh outgoing messages can interrupt a
/// sleeping `poll(2)` race-free.
///
/// [`leave_event_loop`]: crate::Connection::leave_event_loop
pub(crate) struct WakePipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl WakePipe {
    pub(crate) fn new() -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];

        // SAFETY: pipe2 with a valid descriptor array.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };

        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    pub(crate) fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Write the wake byte. Dropped bytes are fine, a full pipe is already
    /// a wake-up.
    pub(crate) fn wake(&self) {
        let byte = [1u8];

        // SAFETY: write to an owned descriptor.
        unsafe {
            libc::write(self.write_fd, byte.as_ptr().cast(), 1);
        }
    }

    /// Drain any pending wake bytes.
    pub(crate) fn drain(&self) {
        let mut buf = [0u8; 64];

        loop {
            // SAFETY: read into a valid buffer on an owned descriptor.
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), buf.len()) };

            if n <= 0 {
                break;
            }
        }
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        // SAFETY: Closing descriptors owned by this pipe.
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{now_usec, PollData, WakePipe, NO_TIMEOUT};

    #[test]
    fn wake_pipe_drains() {
        let pipe = WakePipe::new().unwrap();
        pipe.wake();
        pipe.wake();
        pipe.drain();

        let mut buf = [0u8; 8];
        // SAFETY: read on an owned non-blocking descriptor.
        let n = unsafe { libc::read(pipe.read_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        assert!(n < 0, "pipe should be empty after drain");
    }

    #[test]
    fn poll_data_timeouts() {
        let data = PollData {
            fd: 0,
            events: libc::POLLIN,
            timeout_usec: NO_TIMEOUT,
        };

        assert!(data.relative_timeout().is_none());
        assert_eq!(data.poll_timeout_ms(), -1);

        let data = PollData {
            fd: 0,
            events: libc::POLLIN,
            timeout_usec: 0,
        };

        // A past deadline means poll immediately.
        assert_eq!(data.poll_timeout_ms(), 0);

        let data = PollData {
            fd: 0,
            events: libc::POLLIN,
            timeout_usec: now_usec() + 5_000_000,
        };

        assert!(data.poll_timeout_ms() > 0);
    }
}
