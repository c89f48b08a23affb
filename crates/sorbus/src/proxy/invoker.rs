use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::arg::Args;
use crate::connection::MessageFuture;
use crate::error::Result;
use crate::Message;

use super::handle::AsyncCallHandle;
use super::proxy::{PendingCall, Proxy};

/// Builder for one synchronous method invocation, produced by
/// [`Proxy::call_method`].
///
/// # Examples
///
/// ```no_run
/// # use std::time::Duration;
/// # use sorbus::{Connection, Proxy};
/// # let connection = Connection::session()?;
/// # let proxy = Proxy::new(&connection, "org.example", "/org/example/calculator")?;
/// let (product,): (f64,) = proxy
///     .call_method("Multiply")
///     .on_interface("org.example.Calculator")
///     .with_timeout(Duration::from_millis(500))
///     .with_arguments(&(5i64, 2.0f64))?
///     .get()?;
///
/// assert_eq!(product, 10.0);
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct MethodInvoker<'a> {
    proxy: &'a Proxy,
    member: String,
    interface: Option<String>,
    timeout: Option<Duration>,
    body: Message,
}

impl<'a> MethodInvoker<'a> {
    pub(crate) fn new(proxy: &'a Proxy, member: &str) -> Self {
        Self {
            proxy,
            member: member.to_string(),
            interface: None,
            timeout: None,
            body: Message::plain(),
        }
    }

    /// The interface the method belongs to.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    /// Override the connection-wide method call timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append the call arguments.
    pub fn with_arguments<T>(mut self, args: &T) -> Result<Self>
    where
        T: Args,
    {
        self.body.append_all(args)?;
        Ok(self)
    }

    fn build(mut self) -> Result<(&'a Proxy, Option<Duration>, Message)> {
        let mut message = self
            .proxy
            .build_call(self.interface.as_deref(), &self.member);

        self.body.seal()?;
        self.body.copy_body_to(&mut message)?;
        Ok((self.proxy, self.timeout, message))
    }

    /// Send the call and block until its reply message.
    pub fn reply(self) -> Result<Message> {
        let (proxy, timeout, message) = self.build()?;
        proxy.connection().call(message, timeout)
    }

    /// Send the call and read the reply into the given tuple of types.
    pub fn get<T>(self) -> Result<T>
    where
        T: Args,
    {
        let mut reply = self.reply()?;
        reply.read_all()
    }

    /// Send the call flagged as expecting no reply; none will arrive, not
    /// even an error.
    pub fn dont_expect_reply(self) -> Result<()> {
        let (proxy, _, mut message) = self.build()?;
        message.set_no_reply_expected(true);
        proxy.connection().send(message)?;
        Ok(())
    }
}

/// Builder for one asynchronous method invocation, produced by
/// [`Proxy::call_method_async`]. Ends in a callback registration or a
/// future.
pub struct AsyncMethodInvoker<'a> {
    proxy: &'a Proxy,
    member: String,
    interface: Option<String>,
    timeout: Option<Duration>,
    body: Message,
}

impl<'a> AsyncMethodInvoker<'a> {
    pub(crate) fn new(proxy: &'a Proxy, member: &str) -> Self {
        Self {
            proxy,
            member: member.to_string(),
            interface: None,
            timeout: None,
            body: Message::plain(),
        }
    }

    /// The interface the method belongs to.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    /// Override the connection-wide method call timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append the call arguments.
    pub fn with_arguments<T>(mut self, args: &T) -> Result<Self>
    where
        T: Args,
    {
        self.body.append_all(args)?;
        Ok(self)
    }

    fn build(mut self) -> Result<(&'a Proxy, Option<Duration>, Message)> {
        let mut message = self
            .proxy
            .build_call(self.interface.as_deref(), &self.member);

        self.body.seal()?;
        self.body.copy_body_to(&mut message)?;
        Ok((self.proxy, self.timeout, message))
    }

    /// Send the call and invoke `callback` with the result once it
    /// arrives, from whichever thread drives the connection.
    ///
    /// The returned handle observes and cancels the call; a cancelled call
    /// never invokes the callback, even if the reply is already in flight.
    pub fn upon_reply_invoke<F>(self, callback: F) -> Result<AsyncCallHandle>
    where
        F: FnOnce(Result<Message>) + Send + 'static,
    {
        let (proxy, timeout, message) = self.build()?;

        let inner = Arc::clone(&proxy.inner);

        let id = {
            let mut state = inner.lock_state();
            state.next_call += 1;
            state.next_call
        };

        let weak = Arc::downgrade(&inner);

        let wrapped = move |result| {
            // Drain the tracking entry as the call leaves its pending
            // state.
            if let Some(inner) = weak.upgrade() {
                inner.lock_state().pending.remove(&id);
            }

            callback(result);
        };

        let (slot, shared) = proxy
            .connection()
            .call_async_tracked(message, wrapped, timeout)?;

        let observer = std::sync::Arc::clone(&shared);

        {
            let mut state = inner.lock_state();
            state.pending.insert(id, PendingCall { shared, _slot: slot });
        }

        // The reply may have been dispatched before the entry was inserted;
        // do not leave a completed entry behind.
        if !observer.is_pending() {
            inner.lock_state().pending.remove(&id);
        }

        Ok(AsyncCallHandle::new(Arc::downgrade(&inner), id))
    }

    /// Send the call and obtain a future of the raw reply message.
    ///
    /// Dropping the future cancels the call.
    pub fn with_future(self) -> Result<MessageFuture> {
        let (proxy, timeout, message) = self.build()?;
        proxy.connection().call_with_future(message, timeout)
    }

    /// Send the call and obtain a future of the typed result tuple.
    pub fn get_future<T>(self) -> Result<MethodReplyFuture<T>>
    where
        T: Args,
    {
        Ok(MethodReplyFuture {
            inner: self.with_future()?,
            _marker: PhantomData,
        })
    }
}

/// A future resolving to the typed result tuple of an asynchronous method
/// call.
pub struct MethodReplyFuture<T> {
    inner: MessageFuture,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Future for MethodReplyFuture<T>
where
    T: Args,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(result) => {
                Poll::Ready(result.and_then(|mut message| message.read_all::<T>()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
