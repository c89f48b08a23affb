use std::fmt::Write;
use std::sync::Arc;

use crate::connection::Inner;
use crate::{ObjectPath, Signature};

use super::vtable::RegisteredInterface;
use super::PropertyUpdate;

const DOCTYPE: &str = "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

const PEER_XML: &str = " <interface name=\"org.freedesktop.DBus.Peer\">\n  <method name=\"Ping\"/>\n  <method name=\"GetMachineId\">\n   <arg type=\"s\" name=\"machine_uuid\" direction=\"out\"/>\n  </method>\n </interface>\n";

const INTROSPECTABLE_XML: &str = " <interface name=\"org.freedesktop.DBus.Introspectable\">\n  <method name=\"Introspect\">\n   <arg name=\"data\" type=\"s\" direction=\"out\"/>\n  </method>\n </interface>\n";

const PROPERTIES_XML: &str = " <interface name=\"org.freedesktop.DBus.Properties\">\n  <method name=\"Get\">\n   <arg name=\"interface\" direction=\"in\" type=\"s\"/>\n   <arg name=\"property\" direction=\"in\" type=\"s\"/>\n   <arg name=\"value\" direction=\"out\" type=\"v\"/>\n  </method>\n  <method name=\"GetAll\">\n   <arg name=\"interface\" direction=\"in\" type=\"s\"/>\n   <arg name=\"properties\" direction=\"out\" type=\"a{sv}\"/>\n  </method>\n  <method name=\"Set\">\n   <arg name=\"interface\" direction=\"in\" type=\"s\"/>\n   <arg name=\"property\" direction=\"in\" type=\"s\"/>\n   <arg name=\"value\" direction=\"in\" type=\"v\"/>\n  </method>\n  <signal name=\"PropertiesChanged\">\n   <arg type=\"s\" name=\"interface\"/>\n   <arg type=\"a{sv}\" name=\"changed_properties\"/>\n   <arg type=\"as\" name=\"invalidated_properties\"/>\n  </signal>\n </interface>\n";

const OBJECT_MANAGER_XML: &str = " <interface name=\"org.freedesktop.DBus.ObjectManager\">\n  <method name=\"GetManagedObjects\">\n   <arg type=\"a{oa{sa{sv}}}\" name=\"object_paths_interfaces_and_properties\" direction=\"out\"/>\n  </method>\n  <signal name=\"InterfacesAdded\">\n   <arg type=\"o\" name=\"object_path\"/>\n   <arg type=\"a{sa{sv}}\" name=\"interfaces_and_properties\"/>\n  </signal>\n  <signal name=\"InterfacesRemoved\">\n   <arg type=\"o\" name=\"object_path\"/>\n   <arg type=\"as\" name=\"interfaces\"/>\n  </signal>\n </interface>\n";

/// Produce the introspection XML for the node at `path`: every registered
/// interface, the standard interfaces the dispatcher synthesizes, and the
/// direct child nodes.
pub(crate) fn introspect_path(inner: &Arc<Inner>, path: &ObjectPath) -> String {
    let interfaces = inner.interfaces_at(path);
    let children = inner.child_names(path);

    let mut out = String::new();
    out.push_str(DOCTYPE);
    out.push_str("<node>\n");

    if !interfaces.is_empty() {
        out.push_str(PEER_XML);
        out.push_str(INTROSPECTABLE_XML);
        out.push_str(PROPERTIES_XML);
    }

    if inner.has_object_manager_at(path) {
        out.push_str(OBJECT_MANAGER_XML);
    }

    for interface in &interfaces {
        write_interface(&mut out, interface);
    }

    for child in children {
        let _ = writeln!(out, " <node name=\"{child}\"/>");
    }

    out.push_str("</node>\n");
    out
}

fn write_interface(out: &mut String, interface: &RegisteredInterface) {
    let vtable = interface.vtable();

    let _ = writeln!(out, " <interface name=\"{}\">", interface.name());

    if vtable.deprecated {
        annotation(out, "  ", "org.freedesktop.DBus.Deprecated", "true");
    }

    if vtable.privileged {
        annotation(out, "  ", "org.freedesktop.systemd1.Privileged", "true");
    }

    for method in &vtable.methods {
        let _ = writeln!(out, "  <method name=\"{}\">", method.name);

        write_args(out, &method.in_signature, &method.in_names, Some("in"));
        write_args(out, &method.out_signature, &method.out_names, Some("out"));

        if method.deprecated {
            annotation(out, "   ", "org.freedesktop.DBus.Deprecated", "true");
        }

        if method.privileged {
            annotation(out, "   ", "org.freedesktop.systemd1.Privileged", "true");
        }

        if method.no_reply {
            annotation(out, "   ", "org.freedesktop.DBus.Method.NoReply", "true");
        }

        out.push_str("  </method>\n");
    }

    for signal in &vtable.signals {
        let _ = writeln!(out, "  <signal name=\"{}\">", signal.name);
        write_args(out, &signal.signature, &signal.arg_names, None);

        if signal.deprecated {
            annotation(out, "   ", "org.freedesktop.DBus.Deprecated", "true");
        }

        out.push_str("  </signal>\n");
    }

    for property in &vtable.properties {
        let access = match (&property.getter, &property.setter) {
            (Some(_), Some(_)) => "readwrite",
            (Some(_), None) => "read",
            (None, Some(_)) => "write",
            // A property without accessors is unusable; advertise it as
            // readable so the description at least names it.
            (None, None) => "read",
        };

        let _ = writeln!(
            out,
            "  <property name=\"{}\" type=\"{}\" access=\"{access}\">",
            property.name, property.signature
        );

        if property.deprecated {
            annotation(out, "   ", "org.freedesktop.DBus.Deprecated", "true");
        }

        let update = interface.update_of(property);

        if update != PropertyUpdate::EmitsChange {
            let value = match update {
                PropertyUpdate::EmitsChange => "true",
                PropertyUpdate::EmitsInvalidation => "invalidates",
                PropertyUpdate::Const => "const",
                PropertyUpdate::EmitsNoSignal => "false",
            };

            annotation(
                out,
                "   ",
                "org.freedesktop.DBus.Property.EmitsChangedSignal",
                value,
            );
        }

        out.push_str("  </property>\n");
    }

    out.push_str(" </interface>\n");
}

/// Write one `<arg/>` element per single complete type in the signature.
fn write_args(out: &mut String, signature: &Signature, names: &[String], direction: Option<&str>) {
    let mut remainder = signature;
    let mut index = 0;

    loop {
        let Some((head, tail)) = remainder.split_first() else {
            break;
        };

        out.push_str("   <arg");

        if let Some(name) = names.get(index) {
            let _ = write!(out, " name=\"{name}\"");
        }

        let _ = write!(out, " type=\"{head}\"");

        if let Some(direction) = direction {
            let _ = write!(out, " direction=\"{direction}\"");
        }

        out.push_str("/>\n");

        remainder = tail;
        index += 1;
    }
}

fn annotation(out: &mut String, indent: &str, name: &str, value: &str) {
    let _ = writeln!(
        out,
        "{indent}<annotation name=\"{name}\" value=\"{value}\"/>"
    );
}
