use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::error::name;
use crate::{
    Connection, Method, Object, Property, PropertyUpdate, Proxy, Signature, VTable, Variant,
};

const IFACE: &str = "org.sorbus.test.Widget";
const PATH: &str = "/org/sorbus/test/widget";

struct Fixture {
    server: Connection,
    client: Connection,
    object: Object,
    blocking: Arc<AtomicBool>,
}

/// Stand up a connected pair with a published test object on the server
/// side and the server loop running.
fn fixture() -> crate::Result<Fixture> {
    let (client, server) = Connection::direct_pair()?;

    let action = Arc::new(AtomicU32::new(0));
    let blocking = Arc::new(AtomicBool::new(true));

    let mut object = Object::new(&server, PATH)?;

    let get_action = Arc::clone(&action);
    let set_action = Arc::clone(&action);
    let get_blocking = Arc::clone(&blocking);

    object.add_vtable(
        IFACE,
        VTable::new()
            .method(Method::new(
                "multiply",
                Signature::new_const(b"xd"),
                Signature::new_const(b"d"),
                |call, reply| {
                    let (a, b) = call.read_all::<(i64, f64)>()?;
                    reply.append(&(a as f64 * b))
                },
            ))
            .method(Method::new(
                "doOperation",
                Signature::new_const(b"u"),
                Signature::new_const(b"u"),
                |call, reply| {
                    let millis = call.read::<u32>()?;
                    std::thread::sleep(Duration::from_millis(u64::from(millis)));
                    reply.append(&millis)
                },
            ))
            .method(Method::with_deferred_handler(
                "asyncAdd",
                Signature::new_const(b"uu"),
                Signature::new_const(b"u"),
                |mut call, sink| {
                    let (delay_ms, value) = call.read_all::<(u32, u32)>()?;

                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(u64::from(delay_ms)));
                        let _ = sink.return_results(&(value + 1,));
                    });

                    Ok(())
                },
            ))
            .property(
                Property::new("state", Signature::STRING)
                    .with_getter(|| Variant::new(&"default-state-value".to_string())),
            )
            .property(
                Property::new("action", Signature::UINT32)
                    .with_getter(move || Variant::new(&get_action.load(Ordering::SeqCst)))
                    .with_setter(move |value| {
                        set_action.store(value.get()?, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .property(
                Property::new("blocking", Signature::BOOLEAN)
                    .with_getter(move || Variant::new(&get_blocking.load(Ordering::SeqCst))),
            )
            .property(
                Property::new("version", Signature::UINT32)
                    .update_behavior(PropertyUpdate::Const)
                    .with_getter(|| Variant::new(&4u32)),
            ),
    )?;

    object.publish()?;
    server.enter_event_loop_async()?;

    Ok(Fixture {
        server,
        client,
        object,
        blocking,
    })
}

fn proxy(f: &Fixture) -> crate::Result<Proxy> {
    Proxy::new(&f.client, "", PATH)
}

#[test]
fn multiply_returns_the_product() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    let (product,): (f64,) = proxy
        .call_method("multiply")
        .on_interface(IFACE)
        .with_arguments(&(5i64, 2.0f64))?
        .get()?;

    assert_eq!(product, 10.0);
    Ok(())
}

#[test]
fn missing_targets_yield_canonical_errors() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    let error = proxy
        .call_method("noSuchMethod")
        .on_interface(IFACE)
        .get::<()>()
        .unwrap_err();
    assert_eq!(error.error_name(), name::UNKNOWN_METHOD);

    let error = proxy
        .call_method("multiply")
        .on_interface("org.sorbus.test.Missing")
        .get::<()>()
        .unwrap_err();
    assert_eq!(error.error_name(), name::UNKNOWN_INTERFACE);

    let bad_path = Proxy::new(&f.client, "", "/org/sorbus/test/nowhere")?;
    let error = bad_path
        .call_method("multiply")
        .on_interface(IFACE)
        .get::<()>()
        .unwrap_err();
    assert_eq!(error.error_name(), name::UNKNOWN_OBJECT);

    let error = proxy
        .call_method("multiply")
        .on_interface(IFACE)
        .with_arguments(&("wrong".to_string(),))?
        .get::<()>()
        .unwrap_err();
    assert_eq!(error.error_name(), name::INVALID_ARGS);
    Ok(())
}

#[test]
fn property_access_round_trips() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    let state: String = proxy.get_property("state").on_interface(IFACE).get()?;
    assert_eq!(state, "default-state-value");

    proxy
        .set_property("action")
        .on_interface(IFACE)
        .to_value(&5678u32)?;

    let action: u32 = proxy.get_property("action").on_interface(IFACE).get()?;
    assert_eq!(action, 5678);

    // `state` has no setter.
    let error = proxy
        .set_property("state")
        .on_interface(IFACE)
        .to_value(&"other".to_string())
        .unwrap_err();
    assert_eq!(error.error_name(), name::ACCESS_DENIED);

    // Setting with a mismatched type is rejected before the setter runs.
    let error = proxy
        .set_property("action")
        .on_interface(IFACE)
        .to_value(&"not a number".to_string())
        .unwrap_err();
    assert_eq!(error.error_name(), name::INVALID_ARGS);

    let all = proxy.get_all_properties(IFACE)?;
    assert_eq!(all.len(), 4);
    assert_eq!(all["action"].get::<u32>()?, 5678);
    assert_eq!(all["version"].get::<u32>()?, 4);
    Ok(())
}

#[test]
fn tiny_timeout_fails_fast() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    let started = Instant::now();

    let error = proxy
        .call_method("doOperation")
        .on_interface(IFACE)
        .with_timeout(Duration::from_micros(1))
        .with_arguments(&(1_000u32,))?
        .get::<(u32,)>()
        .unwrap_err();

    assert_eq!(error.error_name(), name::TIMEOUT);
    assert!(error.is_timeout());
    assert!(started.elapsed() < Duration::from_millis(50));
    Ok(())
}

#[test]
fn deferred_replies_complete_out_of_order() -> crate::Result<()> {
    let f = fixture()?;

    let (sender, receiver) = mpsc::channel();
    let mut workers = Vec::new();

    for delay in [1500u32, 1000, 500] {
        let client = f.client.clone();
        let sender = sender.clone();

        workers.push(std::thread::spawn(move || -> crate::Result<()> {
            let proxy = Proxy::new(&client, "", PATH)?;

            let (value,): (u32,) = proxy
                .call_method("asyncAdd")
                .on_interface(IFACE)
                .with_timeout(Duration::from_secs(10))
                .with_arguments(&(delay, delay))?
                .get()?;

            sender.send(value).expect("result channel");
            Ok(())
        }));
    }

    drop(sender);

    let order: Vec<u32> = receiver.iter().collect();
    assert_eq!(order, [501, 1001, 1501]);

    for worker in workers {
        worker.join().expect("worker thread")?;
    }

    Ok(())
}

#[test]
fn properties_changed_signal_carries_the_toggled_value() -> crate::Result<()> {
    let f = fixture()?;
    f.client.enter_event_loop_async()?;

    let proxy = proxy(&f)?;
    let properties = crate::PropertiesProxy::new(&proxy);

    let (sender, receiver) = mpsc::channel();

    properties.subscribe_properties_changed(move |interface, changed, invalidated| {
        sender
            .send((interface.to_string(), changed, invalidated))
            .expect("signal channel");
        Ok(())
    })?;

    f.blocking.store(false, Ordering::SeqCst);
    f.object.emit_properties_changed(IFACE, &["blocking"])?;

    let (interface, changed, invalidated) = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("PropertiesChanged not observed");

    assert_eq!(interface, IFACE);
    assert_eq!(changed.len(), 1);
    assert!(!changed["blocking"].get::<bool>()?);
    assert!(invalidated.is_empty());
    Ok(())
}

#[test]
fn signal_subscription_slot_drop_stops_delivery() -> crate::Result<()> {
    let f = fixture()?;
    f.client.enter_event_loop_async()?;

    let (sender, receiver) = mpsc::channel();

    let rule = format!("type='signal',interface='{IFACE}',member='Pinged',path='{PATH}'");

    let slot = f.client.add_match(&rule, move |_| {
        sender.send(()).expect("signal channel");
        Ok(())
    })?;

    f.object
        .emit_signal("Pinged")
        .on_interface(IFACE)
        .emit()?;

    receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("signal not observed");

    drop(slot);

    f.object
        .emit_signal("Pinged")
        .on_interface(IFACE)
        .emit()?;

    // Give delivery a moment; nothing may arrive.
    assert!(receiver.recv_timeout(Duration::from_millis(300)).is_err());
    Ok(())
}

#[test]
fn duplicate_signal_subscriptions_are_refused() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    proxy
        .subscribe_signal("Pinged")
        .on_interface(IFACE)
        .call(|_| Ok(()))?;

    let error = proxy
        .subscribe_signal("Pinged")
        .on_interface(IFACE)
        .call(|_| Ok(()))
        .unwrap_err();

    assert_eq!(error.error_name(), name::FAILED);
    Ok(())
}

#[test]
fn introspection_is_complete_and_idempotent() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    let introspectable = crate::IntrospectableProxy::new(&proxy);
    let first = introspectable.introspect()?;
    let second = introspectable.introspect()?;
    assert_eq!(first, second);

    assert!(first.contains("<interface name=\"org.sorbus.test.Widget\">"));
    assert!(first.contains("<method name=\"multiply\">"));
    assert!(first.contains("<arg type=\"x\" direction=\"in\"/>"));
    assert!(first.contains("<property name=\"state\" type=\"s\" access=\"read\">"));
    assert!(first.contains("<property name=\"action\" type=\"u\" access=\"readwrite\">"));
    assert!(first.contains(
        "<annotation name=\"org.freedesktop.DBus.Property.EmitsChangedSignal\" value=\"const\"/>"
    ));
    assert!(first.contains("org.freedesktop.DBus.Properties"));
    Ok(())
}

#[test]
fn peer_ping_round_trips() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    crate::PeerProxy::new(&proxy).ping()
}

#[test]
fn object_manager_lists_managed_objects() -> crate::Result<()> {
    let (client, server) = Connection::direct_pair()?;

    let manager_slot = server.add_object_manager("/org/sorbus/test")?;

    let mut object = Object::new(&server, PATH)?;

    object.add_vtable(
        IFACE,
        VTable::new().property(
            Property::new("state", Signature::STRING)
                .with_getter(|| Variant::new(&"managed".to_string())),
        ),
    )?;

    object.publish()?;
    server.enter_event_loop_async()?;

    let manager_proxy = Proxy::new(&client, "", "/org/sorbus/test")?;
    let objects = crate::ObjectManagerProxy::new(&manager_proxy).get_managed_objects()?;

    assert_eq!(objects.len(), 1);
    let interfaces = &objects[&crate::ObjectPathBuf::new(PATH)?];
    assert_eq!(
        interfaces[IFACE]["state"].get::<String>()?,
        "managed"
    );

    drop(manager_slot);

    // Without the manager registration the interface disappears.
    let error = crate::ObjectManagerProxy::new(&manager_proxy)
        .get_managed_objects()
        .unwrap_err();
    assert_eq!(error.error_name(), name::UNKNOWN_INTERFACE);
    Ok(())
}

#[test]
fn interfaces_added_signal_reaches_subscribers() -> crate::Result<()> {
    let f = fixture()?;
    f.client.enter_event_loop_async()?;

    // Manager above the object's path.
    let _manager = f.server.add_object_manager("/org/sorbus/test")?;

    let manager_proxy = Proxy::new(&f.client, "", "/org/sorbus/test")?;
    let (sender, receiver) = mpsc::channel();

    crate::ObjectManagerProxy::new(&manager_proxy).subscribe_interfaces_added(
        move |path, interfaces| {
            sender.send((path, interfaces)).expect("signal channel");
            Ok(())
        },
    )?;

    f.object.emit_interfaces_added(&[])?;

    let (path, interfaces) = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("InterfacesAdded not observed");

    assert_eq!(path, PATH);
    assert!(interfaces.contains_key(IFACE));
    // `state` is readable and emits changes, so its value rides along.
    assert_eq!(
        interfaces[IFACE]["state"].get::<String>()?,
        "default-state-value"
    );
    Ok(())
}

#[test]
fn event_loop_exit_is_one_way() -> crate::Result<()> {
    let (client, _server) = Connection::direct_pair()?;

    client.enter_event_loop_async()?;
    assert_eq!(
        client.event_loop_state(),
        crate::EventLoopState::InternalThreadRunning
    );

    client.leave_event_loop()?;
    assert_eq!(client.event_loop_state(), crate::EventLoopState::Exited);

    // Re-entering returns immediately instead of blocking this thread.
    let started = Instant::now();
    client.enter_event_loop()?;
    assert!(started.elapsed() < Duration::from_millis(100));

    // And leaving again stays idempotent.
    client.leave_event_loop()?;
    Ok(())
}

#[test]
fn async_calls_can_be_cancelled() -> crate::Result<()> {
    let f = fixture()?;
    f.client.enter_event_loop_async()?;

    let proxy = proxy(&f)?;
    let (sender, receiver) = mpsc::channel();

    let handle = proxy
        .call_method_async("asyncAdd")
        .on_interface(IFACE)
        .with_arguments(&(400u32, 1u32))?
        .upon_reply_invoke(move |result| {
            sender.send(result.is_ok()).expect("callback channel");
        })?;

    assert!(handle.is_pending());
    handle.cancel();
    assert!(!handle.is_pending());

    // The reply arrives on the wire but the callback stays suppressed.
    assert!(receiver.recv_timeout(Duration::from_millis(900)).is_err());

    // Cancelling again is a no-op.
    handle.cancel();
    Ok(())
}

#[test]
fn async_replies_invoke_callbacks_and_futures() -> crate::Result<()> {
    let f = fixture()?;
    f.client.enter_event_loop_async()?;

    let proxy = proxy(&f)?;
    let (sender, receiver) = mpsc::channel();

    let handle = proxy
        .call_method_async("multiply")
        .on_interface(IFACE)
        .with_arguments(&(6i64, 7.0f64))?
        .upon_reply_invoke(move |result| {
            let value = result.and_then(|mut reply| reply.read::<f64>());
            sender.send(value).expect("callback channel");
        })?;

    let value = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("async reply not delivered")?;
    assert_eq!(value, 42.0);
    assert!(!handle.is_pending());

    let future = proxy
        .call_method_async("multiply")
        .on_interface(IFACE)
        .with_arguments(&(10i64, 0.5f64))?
        .get_future::<(f64,)>()?;

    let (value,) = futures::executor::block_on(future)?;
    assert_eq!(value, 5.0);
    Ok(())
}

#[test]
fn no_reply_methods_stay_silent() -> crate::Result<()> {
    let f = fixture()?;
    let proxy = proxy(&f)?;

    proxy
        .call_method("multiply")
        .on_interface(IFACE)
        .with_arguments(&(2i64, 2.0f64))?
        .dont_expect_reply()?;

    // The connection still works afterwards.
    let (product,): (f64,) = proxy
        .call_method("multiply")
        .on_interface(IFACE)
        .with_arguments(&(3i64, 3.0f64))?
        .get()?;
    assert_eq!(product, 9.0);
    Ok(())
}

#[test]
fn dropped_sink_produces_a_failed_reply() -> crate::Result<()> {
    let (client, server) = Connection::direct_pair()?;

    let mut object = Object::new(&server, PATH)?;

    object.add_vtable(
        IFACE,
        VTable::new().method(Method::with_deferred_handler(
            "forgetful",
            Signature::empty(),
            Signature::empty(),
            |_, sink| {
                drop(sink);
                Ok(())
            },
        )),
    )?;

    object.publish()?;
    server.enter_event_loop_async()?;

    let proxy = Proxy::new(&client, "", PATH)?;

    let error = proxy
        .call_method("forgetful")
        .on_interface(IFACE)
        .get::<()>()
        .unwrap_err();

    assert_eq!(error.error_name(), name::FAILED);
    Ok(())
}
