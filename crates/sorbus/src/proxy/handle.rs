use std::sync::Weak;

use super::proxy::ProxyInner;

/// A weak, copyable reference to one pending asynchronous call.
///
/// The handle does not keep the call (or the proxy) alive; it only observes
/// and cancels. At most one of reply, cancellation and timeout wins: once a
/// call has left its pending state, [`is_pending`] stays `false` forever
/// and [`cancel`] has no effect.
///
/// [`is_pending`]: Self::is_pending
/// [`cancel`]: Self::cancel
#[derive(Clone)]
pub struct AsyncCallHandle {
    proxy: Weak<ProxyInner>,
    id: u64,
}

impl AsyncCallHandle {
    pub(crate) fn new(proxy: Weak<ProxyInner>, id: u64) -> Self {
        Self { proxy, id }
    }

    /// Test if the call is still awaiting its reply.
    pub fn is_pending(&self) -> bool {
        let Some(inner) = self.proxy.upgrade() else {
            return false;
        };

        let state = inner.lock_state();
        state
            .pending
            .get(&self.id)
            .map(|call| call.shared.is_pending())
            .unwrap_or(false)
    }

    /// Cancel the call. The callback will not be invoked, even if the
    /// reply is already in flight; a call past its pending state is left
    /// untouched.
    pub fn cancel(&self) {
        let Some(inner) = self.proxy.upgrade() else {
            return;
        };

        let call = {
            let mut state = inner.lock_state();
            state.pending.remove(&self.id)
        };

        if let Some(call) = call {
            // Suppress the callback first so a reply racing the slot
            // teardown still loses.
            call.shared.cancel();
            drop(call);
        }
    }
}

impl std::fmt::Debug for AsyncCallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCallHandle")
            .field("id", &self.id)
            .field("pending", &self.is_pending())
            .finish()
    }
}
