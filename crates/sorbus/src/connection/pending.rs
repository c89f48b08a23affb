use std::sync::mpsc;
use std::sync::Mutex;

use crate::error::{name, Error, Result};
use crate::{Message, MessageKind};

/// The observable state of one pending method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallState {
    /// Sent, no reply yet.
    Pending,
    /// A reply, an error reply or a timeout was delivered.
    Completed,
    /// The call was cancelled before a reply was delivered.
    Cancelled,
}

type Callback = Box<dyn FnOnce(Result<Message>) + Send>;

struct AsyncInner {
    state: CallState,
    callback: Option<Callback>,
}

/// State shared between a pending asynchronous call, the event loop which
/// completes it and the handle which may cancel it.
pub(crate) struct AsyncShared {
    inner: Mutex<AsyncInner>,
}

impl AsyncShared {
    pub(crate) fn new(callback: Callback) -> Self {
        Self {
            inner: Mutex::new(AsyncInner {
                state: CallState::Pending,
                callback: Some(callback),
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.lock().expect("pending call lock").state == CallState::Pending
    }

    /// Transition to `Cancelled`, dropping the callback. A call already
    /// completed stays completed; cancelling twice is a no-op.
    pub(crate) fn cancel(&self) {
        let mut inner = self.inner.lock().expect("pending call lock");

        if inner.state == CallState::Pending {
            inner.state = CallState::Cancelled;
            inner.callback = None;
        }
    }

    /// Deliver the result, invoking the callback unless the call was
    /// cancelled first. At most one delivery wins.
    pub(crate) fn complete(&self, result: Result<Message>) {
        let callback = {
            let mut inner = self.inner.lock().expect("pending call lock");

            if inner.state != CallState::Pending {
                return;
            }

            inner.state = CallState::Completed;
            inner.callback.take()
        };

        if let Some(callback) = callback {
            callback(result);
        }
    }
}

/// How the reply of one in-flight method call is delivered.
pub(crate) enum PendingKind {
    /// A thread is blocked waiting on the channel.
    Sync(mpsc::Sender<Result<Message>>),
    /// A callback (or a future) is invoked from the event loop.
    Async(std::sync::Arc<AsyncShared>),
}

/// One in-flight method call tracked by the connection.
pub(crate) struct Pending {
    /// Absolute `CLOCK_MONOTONIC` deadline in microseconds.
    pub(crate) deadline_usec: u64,
    pub(crate) kind: PendingKind,
}

impl Pending {
    /// Deliver the result to whoever waits for it.
    pub(crate) fn complete(self, result: Result<Message>) {
        match self.kind {
            PendingKind::Sync(sender) => {
                // The caller may have given up; nothing to deliver to then.
                let _ = sender.send(result);
            }
            PendingKind::Async(shared) => {
                shared.complete(result);
            }
        }
    }

    /// The canonical timeout error delivered on deadline expiry.
    pub(crate) fn timeout_error() -> Error {
        Error::new(name::TIMEOUT, "method call timed out")
    }
}

/// Convert a received reply message into the result surfaced to callers:
/// error replies become [`Error`] values carrying the error name and the
/// message text from the body.
pub(crate) fn reply_to_result(mut message: Message) -> Result<Message> {
    if let MessageKind::Error { error_name, .. } = message.kind() {
        let error_name = error_name.to_string();
        let text = message.read::<String>().unwrap_or_default();
        return Err(Error::new(error_name, text));
    }

    Ok(message)
}
