//! Typed client façades for the standard D-Bus interfaces.
//!
//! Each helper composes with (rather than replaces) a [`Proxy`]: generated
//! or hand-written proxies hold the helpers they need and delegate to them.

use std::collections::HashMap;

use crate::error::Result;
use crate::org_freedesktop_dbus as fdo;
use crate::{ObjectPathBuf, Proxy, Variant};

/// Client of `org.freedesktop.DBus.Peer`.
pub struct PeerProxy {
    proxy: Proxy,
}

impl PeerProxy {
    /// Wrap the given proxy.
    pub fn new(proxy: &Proxy) -> Self {
        Self {
            proxy: proxy.clone(),
        }
    }

    /// Ping the peer, verifying it is reachable and responding.
    pub fn ping(&self) -> Result<()> {
        self.proxy
            .call_method("Ping")
            .on_interface(fdo::PEER)
            .get::<()>()
    }

    /// The machine id of the peer's host.
    pub fn get_machine_id(&self) -> Result<String> {
        self.proxy
            .call_method("GetMachineId")
            .on_interface(fdo::PEER)
            .get::<(String,)>()
            .map(|(id,)| id)
    }
}

/// Client of `org.freedesktop.DBus.Introspectable`.
pub struct IntrospectableProxy {
    proxy: Proxy,
}

impl IntrospectableProxy {
    /// Wrap the given proxy.
    pub fn new(proxy: &Proxy) -> Self {
        Self {
            proxy: proxy.clone(),
        }
    }

    /// The XML description of the remote object.
    pub fn introspect(&self) -> Result<String> {
        self.proxy
            .call_method("Introspect")
            .on_interface(fdo::INTROSPECTABLE)
            .get::<(String,)>()
            .map(|(xml,)| xml)
    }
}

/// Client of `org.freedesktop.DBus.Properties`, including the typed
/// `PropertiesChanged` subscription.
pub struct PropertiesProxy {
    proxy: Proxy,
}

impl PropertiesProxy {
    /// Wrap the given proxy.
    pub fn new(proxy: &Proxy) -> Self {
        Self {
            proxy: proxy.clone(),
        }
    }

    /// Fetch one property, variant-wrapped.
    pub fn get(&self, interface: &str, property: &str) -> Result<Variant> {
        self.proxy
            .get_property(property)
            .on_interface(interface)
            .get_variant()
    }

    /// Write one property from a variant.
    pub fn set(&self, interface: &str, property: &str, value: &Variant) -> Result<()> {
        self.proxy
            .set_property(property)
            .on_interface(interface)
            .to_variant(value)
    }

    /// Fetch every readable property of the interface.
    pub fn get_all(&self, interface: &str) -> Result<HashMap<String, Variant>> {
        self.proxy.get_all_properties(interface)
    }

    /// Subscribe to `PropertiesChanged`, receiving the interface name, the
    /// changed values and the invalidated property names.
    pub fn subscribe_properties_changed<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(&str, HashMap<String, Variant>, Vec<String>) -> Result<()> + Send + 'static,
    {
        self.proxy
            .subscribe_signal("PropertiesChanged")
            .on_interface(fdo::PROPERTIES)
            .call(move |message| {
                let (interface, changed, invalidated) =
                    message.read_all::<(String, HashMap<String, Variant>, Vec<String>)>()?;
                handler(&interface, changed, invalidated)
            })
    }
}

/// The interface-to-properties map carried by the object manager payloads.
pub type InterfacesAndProperties = HashMap<String, HashMap<String, Variant>>;

/// Client of `org.freedesktop.DBus.ObjectManager`.
pub struct ObjectManagerProxy {
    proxy: Proxy,
}

impl ObjectManagerProxy {
    /// Wrap the given proxy. The proxy's path must be the one the remote
    /// object manager is registered at.
    pub fn new(proxy: &Proxy) -> Self {
        Self {
            proxy: proxy.clone(),
        }
    }

    /// The full tree of managed objects with their interfaces and readable
    /// property values.
    pub fn get_managed_objects(
        &self,
    ) -> Result<HashMap<ObjectPathBuf, InterfacesAndProperties>> {
        self.proxy
            .call_method("GetManagedObjects")
            .on_interface(fdo::OBJECT_MANAGER)
            .get::<(HashMap<ObjectPathBuf, InterfacesAndProperties>,)>()
            .map(|(objects,)| objects)
    }

    /// Subscribe to `InterfacesAdded`.
    pub fn subscribe_interfaces_added<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(ObjectPathBuf, InterfacesAndProperties) -> Result<()> + Send + 'static,
    {
        self.proxy
            .subscribe_signal("InterfacesAdded")
            .on_interface(fdo::OBJECT_MANAGER)
            .call(move |message| {
                let (path, interfaces) =
                    message.read_all::<(ObjectPathBuf, InterfacesAndProperties)>()?;
                handler(path, interfaces)
            })
    }

    /// Subscribe to `InterfacesRemoved`.
    pub fn subscribe_interfaces_removed<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(ObjectPathBuf, Vec<String>) -> Result<()> + Send + 'static,
    {
        self.proxy
            .subscribe_signal("InterfacesRemoved")
            .on_interface(fdo::OBJECT_MANAGER)
            .call(move |message| {
                let (path, interfaces) = message.read_all::<(ObjectPathBuf, Vec<String>)>()?;
                handler(path, interfaces)
            })
    }
}
