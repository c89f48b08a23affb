use crate::error::{Error, Result};
use crate::match_rule::MatchRule;
use crate::Message;

use super::proxy::Proxy;

/// Builder for a signal subscription, produced by
/// [`Proxy::subscribe_signal`].
///
/// The subscription is, at the engine level, a match rule scoped to the
/// proxy's destination, path and the chosen interface and member.
///
/// # Examples
///
/// ```no_run
/// # use sorbus::{Connection, Proxy};
/// # let connection = Connection::session()?;
/// # let proxy = Proxy::new(&connection, "org.example", "/org/example/widget")?;
/// proxy
///     .subscribe_signal("StateChanged")
///     .on_interface("org.example.Widget")
///     .call(|signal| {
///         let state: String = signal.read()?;
///         println!("state is now {state}");
///         Ok(())
///     })?;
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct SignalSubscriber<'a> {
    proxy: &'a Proxy,
    member: String,
    interface: Option<String>,
}

impl<'a> SignalSubscriber<'a> {
    pub(crate) fn new(proxy: &'a Proxy, member: &str) -> Self {
        Self {
            proxy,
            member: member.to_string(),
            interface: None,
        }
    }

    /// The interface the signal belongs to. Required.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    fn rule(&self, interface: &str) -> MatchRule {
        let mut rule = MatchRule::new()
            .with_signal_type()
            .with_path(self.proxy.inner.path.clone())
            .with_interface(interface)
            .with_member(&self.member);

        if !self.proxy.inner.destination.is_empty() {
            rule = rule.with_sender(&*self.proxy.inner.destination);
        }

        rule
    }

    /// Install the handler as a proxy-owned subscription, dropped when the
    /// proxy is dropped or [unregistered].
    ///
    /// A second subscription for the same (interface, member) pair on this
    /// proxy is refused.
    ///
    /// [unregistered]: Proxy::unregister
    pub fn call<F>(self, handler: F) -> Result<()>
    where
        F: FnMut(&mut Message) -> Result<()> + Send + 'static,
    {
        let interface = self
            .interface
            .clone()
            .ok_or_else(|| Error::failed("signal subscription requires an interface"))?;

        let key = (interface.clone(), self.member.clone());

        {
            let state = self.proxy.inner.lock_state();

            if state.signal_slots.contains_key(&key) {
                return Err(Error::failed(format!(
                    "a handler for {}.{} is already installed",
                    key.0, key.1
                )));
            }
        }

        let rule = self.rule(&interface);
        let slot = self
            .proxy
            .connection()
            .add_match(&rule.to_string(), handler)?;

        let mut state = self.proxy.inner.lock_state();

        if state.signal_slots.contains_key(&key) {
            return Err(Error::failed(format!(
                "a handler for {}.{} is already installed",
                key.0, key.1
            )));
        }

        state.signal_slots.insert(key, slot);
        Ok(())
    }
}
