use std::sync::Arc;

use crate::connection::Inner;
use crate::error::{name, Error, Result};
use crate::org_freedesktop_dbus as fdo;
use crate::{ContainerKind, Message, ObjectPath, Signature, Variant};

use super::vtable::{MethodHandler, RegisteredInterface};
use super::{introspect_path, PropertyUpdate, ResultSink};

/// Dispatch one received method call against the connection's registered
/// vtables, transmitting exactly one reply (regular or error) unless the
/// method suppresses it.
pub(crate) fn dispatch_method_call(inner: &Arc<Inner>, mut message: Message) {
    let outcome = route(inner, &mut message);

    let no_reply = message.no_reply_expected();

    match outcome {
        Ok(Some(reply)) => {
            if !no_reply {
                if let Err(error) = inner.queue_message(reply) {
                    log::warn!("failed to send method reply: {error}");
                }
            }
        }
        // A deferred handler took over, or the reply is suppressed.
        Ok(None) => {}
        Err(error) => {
            if no_reply {
                return;
            }

            let reply = match message.create_error_reply(&error) {
                Ok(reply) => reply,
                Err(error) => {
                    log::warn!("failed to build error reply: {error}");
                    return;
                }
            };

            if let Err(error) = inner.queue_message(reply) {
                log::warn!("failed to send error reply: {error}");
            }
        }
    }
}

fn route(inner: &Arc<Inner>, message: &mut Message) -> Result<Option<Message>> {
    let path = message
        .path()
        .ok_or_else(|| Error::new(name::INVALID_ARGS, "method call without a path"))?
        .to_owned();
    let member = message
        .member()
        .ok_or_else(|| Error::new(name::INVALID_ARGS, "method call without a member"))?
        .to_string();

    match message.interface() {
        Some(fdo::PEER) => return handle_peer(message, &member).map(Some),
        Some(fdo::INTROSPECTABLE) => {
            return handle_introspect(inner, message, &path, &member).map(Some);
        }
        Some(fdo::PROPERTIES) => {
            return handle_properties(inner, message, &path, &member).map(Some);
        }
        Some(fdo::OBJECT_MANAGER) => {
            return handle_object_manager(inner, message, &path, &member).map(Some);
        }
        _ => {}
    }

    let interfaces = inner.interfaces_at(&path);

    if interfaces.is_empty() {
        return Err(Error::new(
            name::UNKNOWN_OBJECT,
            format!("no object at path {path}"),
        ));
    }

    let resolved = match message.interface() {
        Some(interface_name) => {
            let interface = interfaces
                .iter()
                .find(|entry| entry.name() == interface_name)
                .ok_or_else(|| {
                    Error::new(
                        name::UNKNOWN_INTERFACE,
                        format!("no interface {interface_name} at path {path}"),
                    )
                })?;

            interface
                .find_method(&member)
                .map(|_| Arc::clone(interface))
        }
        None => interfaces
            .iter()
            .find(|entry| entry.find_method(&member).is_some())
            .cloned(),
    };

    let Some(interface) = resolved else {
        return Err(Error::new(
            name::UNKNOWN_METHOD,
            format!("no method {member} at path {path}"),
        ));
    };

    let method = interface.find_method(&member).expect("method just resolved");

    if message.signature() != &*method.in_signature {
        return Err(Error::new(
            name::INVALID_ARGS,
            format!(
                "call to {member} carries arguments {}, expected {}",
                message.signature(),
                method.in_signature
            ),
        ));
    }

    let suppress = method.no_reply || message.no_reply_expected();

    match &method.handler {
        MethodHandler::Sync(handler) => {
            message.rewind(true)?;
            let mut reply = message.create_reply()?;
            handler(message, &mut reply)?;

            if suppress {
                return Ok(None);
            }

            Ok(Some(reply))
        }
        MethodHandler::Deferred(handler) => {
            let mut call = message.clone();
            call.rewind(true)?;

            let sink = ResultSink::new(Arc::downgrade(inner), message.clone(), !suppress);
            handler(call, sink)?;
            Ok(None)
        }
    }
}

/// `org.freedesktop.DBus.Peer`: liveness and machine identity.
fn handle_peer(message: &mut Message, member: &str) -> Result<Message> {
    match member {
        "Ping" => message.create_reply(),
        "GetMachineId" => {
            let id = std::fs::read_to_string("/etc/machine-id")
                .map_err(|error| Error::failed(format!("cannot read machine id: {error}")))?;

            let mut reply = message.create_reply()?;
            reply.append(&id.trim().to_string())?;
            Ok(reply)
        }
        _ => Err(unknown_method(fdo::PEER, member)),
    }
}

/// `org.freedesktop.DBus.Introspectable`: the XML description of the node.
fn handle_introspect(
    inner: &Arc<Inner>,
    message: &mut Message,
    path: &ObjectPath,
    member: &str,
) -> Result<Message> {
    if member != "Introspect" {
        return Err(unknown_method(fdo::INTROSPECTABLE, member));
    }

    let xml = introspect_path(inner, path);
    let mut reply = message.create_reply()?;
    reply.append(&xml)?;
    Ok(reply)
}

/// `org.freedesktop.DBus.Properties`: synthetic dispatch to the registered
/// accessors.
fn handle_properties(
    inner: &Arc<Inner>,
    message: &mut Message,
    path: &ObjectPath,
    member: &str,
) -> Result<Message> {
    let interfaces = inner.interfaces_at(path);

    if interfaces.is_empty() {
        return Err(Error::new(
            name::UNKNOWN_OBJECT,
            format!("no object at path {path}"),
        ));
    }

    message.rewind(true)?;

    match member {
        "Get" => {
            let (interface_name, property_name) = message.read_all::<(String, String)>()?;
            let (_, property) = find_property(&interfaces, &interface_name, &property_name)?;

            let Some(getter) = &property.getter else {
                return Err(Error::new(
                    name::ACCESS_DENIED,
                    format!("property {property_name} is write-only"),
                ));
            };

            let value = getter()?;
            let mut reply = message.create_reply()?;
            reply.append(&value)?;
            Ok(reply)
        }
        "Set" => {
            let (interface_name, property_name, value) =
                message.read_all::<(String, String, Variant)>()?;

            let (_, property) = find_property(&interfaces, &interface_name, &property_name)?;

            let Some(setter) = &property.setter else {
                return Err(Error::new(
                    name::ACCESS_DENIED,
                    format!("property {property_name} is read-only"),
                ));
            };

            if value.signature() != &*property.signature {
                return Err(Error::new(
                    name::INVALID_ARGS,
                    format!(
                        "property {property_name} has type {}, got {}",
                        property.signature,
                        value.signature()
                    ),
                ));
            }

            setter(value)?;
            message.create_reply()
        }
        "GetAll" => {
            let interface_name = message.read::<String>()?;

            let selected: Vec<&Arc<RegisteredInterface>> = if interface_name.is_empty() {
                interfaces.iter().collect()
            } else {
                let interface = interfaces
                    .iter()
                    .find(|entry| entry.name() == interface_name)
                    .ok_or_else(|| {
                        Error::new(
                            name::UNKNOWN_INTERFACE,
                            format!("no interface {interface_name} at path {path}"),
                        )
                    })?;
                vec![interface]
            };

            let mut reply = message.create_reply()?;
            reply.open_container(ContainerKind::Array, Signature::new_const(b"{sv}"))?;

            for interface in selected {
                for property in &interface.vtable().properties {
                    let Some(getter) = &property.getter else {
                        continue;
                    };

                    let value = getter()?;
                    reply.open_container(ContainerKind::DictEntry, Signature::new_const(b"sv"))?;
                    reply.append(&property.name.clone())?;
                    reply.append(&value)?;
                    reply.close_container()?;
                }
            }

            reply.close_container()?;
            Ok(reply)
        }
        _ => Err(unknown_method(fdo::PROPERTIES, member)),
    }
}

/// `org.freedesktop.DBus.ObjectManager`: the managed object tree.
fn handle_object_manager(
    inner: &Arc<Inner>,
    message: &mut Message,
    path: &ObjectPath,
    member: &str,
) -> Result<Message> {
    if member != "GetManagedObjects" {
        return Err(unknown_method(fdo::OBJECT_MANAGER, member));
    }

    if !inner.has_object_manager_at(path) {
        return Err(Error::new(
            name::UNKNOWN_INTERFACE,
            format!("no object manager at path {path}"),
        ));
    }

    let mut reply = message.create_reply()?;
    reply.open_container(ContainerKind::Array, Signature::new_const(b"{oa{sa{sv}}}"))?;

    for managed in inner.managed_paths(path) {
        if &*managed == path {
            continue;
        }

        reply.open_container(
            ContainerKind::DictEntry,
            Signature::new_const(b"oa{sa{sv}}"),
        )?;
        reply.append(&managed)?;
        append_interfaces_and_properties(inner, &mut reply, &managed, &[])?;
        reply.close_container()?;
    }

    reply.close_container()?;
    Ok(reply)
}

/// Append the `a{sa{sv}}` map of interfaces (optionally restricted by name)
/// and their readable property values at `path`.
fn append_interfaces_and_properties(
    inner: &Arc<Inner>,
    message: &mut Message,
    path: &ObjectPath,
    only: &[&str],
) -> Result<()> {
    message.open_container(ContainerKind::Array, Signature::new_const(b"{sa{sv}}"))?;

    for interface in inner.interfaces_at(path) {
        if !only.is_empty() && !only.contains(&interface.name()) {
            continue;
        }

        message.open_container(ContainerKind::DictEntry, Signature::new_const(b"sa{sv}"))?;
        message.append(&interface.name().to_string())?;
        message.open_container(ContainerKind::Array, Signature::new_const(b"{sv}"))?;

        for property in &interface.vtable().properties {
            let Some(getter) = &property.getter else {
                continue;
            };

            // Invalidation-only properties are omitted; observers fetch
            // them on demand.
            if interface.update_of(property) == PropertyUpdate::EmitsInvalidation {
                continue;
            }

            let value = getter()?;
            message.open_container(ContainerKind::DictEntry, Signature::new_const(b"sv"))?;
            message.append(&property.name.clone())?;
            message.append(&value)?;
            message.close_container()?;
        }

        message.close_container()?;
        message.close_container()?;
    }

    message.close_container()?;
    Ok(())
}

/// Build the canonical `(s a{sv} as)` `PropertiesChanged` signal for the
/// given property names; an empty list means every property of the
/// interface.
pub(crate) fn build_properties_changed(
    inner: &Arc<Inner>,
    path: &ObjectPath,
    interface_name: &str,
    names: &[&str],
) -> Result<Message> {
    let interfaces = inner.interfaces_at(path);

    let interface = interfaces
        .iter()
        .find(|entry| entry.name() == interface_name)
        .ok_or_else(|| {
            Error::new(
                name::UNKNOWN_INTERFACE,
                format!("no interface {interface_name} at path {path}"),
            )
        })?;

    let mut changed: Vec<&super::Property> = Vec::new();
    let mut invalidated: Vec<&str> = Vec::new();

    for property in &interface.vtable().properties {
        if !names.is_empty() && !names.contains(&property.name.as_str()) {
            continue;
        }

        match interface.update_of(property) {
            PropertyUpdate::EmitsChange => {
                if property.getter.is_some() {
                    changed.push(property);
                }
            }
            PropertyUpdate::EmitsInvalidation => {
                invalidated.push(&property.name);
            }
            PropertyUpdate::Const | PropertyUpdate::EmitsNoSignal => {}
        }
    }

    let mut signal = Message::signal(path, fdo::PROPERTIES, "PropertiesChanged");
    signal.append(&interface_name.to_string())?;

    signal.open_container(ContainerKind::Array, Signature::new_const(b"{sv}"))?;

    for property in changed {
        let getter = property.getter.as_ref().expect("changed properties are readable");
        let value = getter()?;
        signal.open_container(ContainerKind::DictEntry, Signature::new_const(b"sv"))?;
        signal.append(&property.name.clone())?;
        signal.append(&value)?;
        signal.close_container()?;
    }

    signal.close_container()?;

    signal.append(&invalidated.iter().map(|n| n.to_string()).collect::<Vec<_>>())?;
    Ok(signal)
}

/// Build the `InterfacesAdded` signal, emitted from the covering object
/// manager's path.
pub(crate) fn build_interfaces_added(
    inner: &Arc<Inner>,
    path: &ObjectPath,
    interfaces: &[&str],
) -> Result<Message> {
    let manager = manager_base(inner, path)?;

    let mut signal = Message::signal(&manager, fdo::OBJECT_MANAGER, "InterfacesAdded");
    signal.append(&path.to_owned())?;
    append_interfaces_and_properties(inner, &mut signal, path, interfaces)?;
    Ok(signal)
}

/// Build the `InterfacesRemoved` signal, emitted from the covering object
/// manager's path.
pub(crate) fn build_interfaces_removed(
    inner: &Arc<Inner>,
    path: &ObjectPath,
    interfaces: &[&str],
) -> Result<Message> {
    let manager = manager_base(inner, path)?;

    let names: Vec<String> = if interfaces.is_empty() {
        inner
            .interfaces_at(path)
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    } else {
        interfaces.iter().map(|n| n.to_string()).collect()
    };

    let mut signal = Message::signal(&manager, fdo::OBJECT_MANAGER, "InterfacesRemoved");
    signal.append(&path.to_owned())?;
    signal.append(&names)?;
    Ok(signal)
}

/// The object manager path covering `path`, which must exist for the
/// `Interfaces*` signals to be emitted.
fn manager_base(inner: &Arc<Inner>, path: &ObjectPath) -> Result<crate::ObjectPathBuf> {
    inner.object_manager_base(path).ok_or_else(|| {
        Error::failed(format!(
            "no object manager registered at {path} or an ancestor of it"
        ))
    })
}

fn find_property<'a>(
    interfaces: &'a [Arc<RegisteredInterface>],
    interface_name: &str,
    property_name: &str,
) -> Result<(&'a Arc<RegisteredInterface>, &'a super::Property)> {
    let interface = interfaces
        .iter()
        .find(|entry| entry.name() == interface_name)
        .ok_or_else(|| {
            Error::new(
                name::UNKNOWN_INTERFACE,
                format!("no interface {interface_name}"),
            )
        })?;

    let property = interface.find_property(property_name).ok_or_else(|| {
        Error::new(
            name::UNKNOWN_PROPERTY,
            format!("no property {property_name} on {interface_name}"),
        )
    })?;

    Ok((interface, property))
}

fn unknown_method(interface: &str, member: &str) -> Error {
    Error::new(
        name::UNKNOWN_METHOD,
        format!("no method {member} on {interface}"),
    )
}
