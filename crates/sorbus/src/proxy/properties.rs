use crate::arg::Arg;
use crate::error::{Error, Result};
use crate::org_freedesktop_dbus as fdo;
use crate::{Message, Variant};

use super::handle::AsyncCallHandle;
use super::invoker::MethodReplyFuture;
use super::proxy::Proxy;

/// Builder for reading one property, produced by [`Proxy::get_property`].
///
/// # Examples
///
/// ```no_run
/// # use sorbus::{Connection, Proxy};
/// # let connection = Connection::session()?;
/// # let proxy = Proxy::new(&connection, "org.example", "/org/example/widget")?;
/// let state: String = proxy
///     .get_property("state")
///     .on_interface("org.example.Widget")
///     .get()?;
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct PropertyGetter<'a> {
    proxy: &'a Proxy,
    property: String,
    interface: Option<String>,
}

impl<'a> PropertyGetter<'a> {
    pub(crate) fn new(proxy: &'a Proxy, property: &str) -> Self {
        Self {
            proxy,
            property: property.to_string(),
            interface: None,
        }
    }

    /// The interface the property belongs to. Required.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    fn interface(&self) -> Result<&str> {
        self.interface
            .as_deref()
            .ok_or_else(|| Error::failed("property access requires an interface"))
    }

    /// Fetch the property as its variant wrapping.
    pub fn get_variant(self) -> Result<Variant> {
        let interface = self.interface()?.to_string();

        self.proxy
            .call_method("Get")
            .on_interface(fdo::PROPERTIES)
            .with_arguments(&(interface, self.property.clone()))?
            .get::<(Variant,)>()
            .map(|(value,)| value)
    }

    /// Fetch the property and extract it as `T`.
    pub fn get<T>(self) -> Result<T>
    where
        T: Arg,
    {
        self.get_variant()?.get()
    }

    /// Fetch the property asynchronously, delivering the variant-wrapped
    /// value to `callback`.
    pub fn get_async<F>(self, callback: F) -> Result<AsyncCallHandle>
    where
        F: FnOnce(Result<Variant>) + Send + 'static,
    {
        let interface = self.interface()?.to_string();

        self.proxy
            .call_method_async("Get")
            .on_interface(fdo::PROPERTIES)
            .with_arguments(&(interface, self.property.clone()))?
            .upon_reply_invoke(move |result: Result<Message>| {
                callback(result.and_then(|mut reply| reply.read::<Variant>()));
            })
    }

    /// Fetch the property asynchronously as a future of its variant
    /// wrapping.
    pub fn get_with_future(self) -> Result<MethodReplyFuture<(Variant,)>> {
        let interface = self.interface()?.to_string();

        self.proxy
            .call_method_async("Get")
            .on_interface(fdo::PROPERTIES)
            .with_arguments(&(interface, self.property.clone()))?
            .get_future()
    }
}

/// Builder for writing one property, produced by [`Proxy::set_property`].
pub struct PropertySetter<'a> {
    proxy: &'a Proxy,
    property: String,
    interface: Option<String>,
}

impl<'a> PropertySetter<'a> {
    pub(crate) fn new(proxy: &'a Proxy, property: &str) -> Self {
        Self {
            proxy,
            property: property.to_string(),
            interface: None,
        }
    }

    /// The interface the property belongs to. Required.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    fn interface(&self) -> Result<&str> {
        self.interface
            .as_deref()
            .ok_or_else(|| Error::failed("property access requires an interface"))
    }

    /// Write the property to the given value.
    pub fn to_value<T>(self, value: &T) -> Result<()>
    where
        T: Arg,
    {
        let variant = Variant::new(value)?;
        self.to_variant(&variant)
    }

    /// Write the property to the value carried by the given variant.
    pub fn to_variant(self, value: &Variant) -> Result<()> {
        let interface = self.interface()?.to_string();

        self.proxy
            .call_method("Set")
            .on_interface(fdo::PROPERTIES)
            .with_arguments(&(interface, self.property.clone(), value.clone()))?
            .get::<()>()
    }

    /// Write the property asynchronously, delivering the outcome to
    /// `callback`.
    pub fn to_value_async<T, F>(self, value: &T, callback: F) -> Result<AsyncCallHandle>
    where
        T: Arg,
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let interface = self.interface()?.to_string();
        let variant = Variant::new(value)?;

        self.proxy
            .call_method_async("Set")
            .on_interface(fdo::PROPERTIES)
            .with_arguments(&(interface, self.property.clone(), variant))?
            .upon_reply_invoke(move |result: Result<Message>| {
                callback(result.map(|_| ()));
            })
    }
}
