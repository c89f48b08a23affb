use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::Result;
use crate::Message;

struct Shared {
    result: Option<Result<Message>>,
    waker: Option<Waker>,
}

/// A future resolving to the reply of an asynchronous method call.
///
/// The future is completed by the connection's event loop (or by whichever
/// thread drives the connection), so something must drive the connection for
/// it to resolve. The future owns the pending-call registration: dropping it
/// cancels the call.
pub struct MessageFuture {
    shared: Arc<Mutex<Shared>>,
    /// Keeps the pending-call registration alive for as long as the future
    /// is interested in it.
    _slot: Option<crate::Slot>,
}

impl MessageFuture {
    pub(crate) fn new() -> (Self, impl FnOnce(Result<Message>) + Send) {
        let shared = Arc::new(Mutex::new(Shared {
            result: None,
            waker: None,
        }));

        let complete = {
            let shared = Arc::clone(&shared);

            move |result: Result<Message>| {
                let waker = {
                    let mut shared = shared.lock().expect("future lock");
                    shared.result = Some(result);
                    shared.waker.take()
                };

                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        };

        (
            Self {
                shared,
                _slot: None,
            },
            complete,
        )
    }

    pub(crate) fn attach_slot(&mut self, slot: crate::Slot) {
        self._slot = Some(slot);
    }
}

impl Future for MessageFuture {
    type Output = Result<Message>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock().expect("future lock");

        if let Some(result) = shared.result.take() {
            return Poll::Ready(result);
        }

        shared.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
