use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use sorbus::{Connection, Method, Object, Property, Signature, VTable, Variant};

const NAME: &str = "org.sorbus.Example";
const INTERFACE: &str = "org.sorbus.Example.Calculator";
const PATH: &str = "/org/sorbus/Example/calculator";

fn main() -> Result<()> {
    env_logger::init();

    let connection = Connection::session()?;
    connection.request_name(NAME)?;

    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_multiply = Arc::clone(&calls);
    let calls_in_getter = Arc::clone(&calls);

    let mut object = Object::new(&connection, PATH)?;

    object.add_vtable(
        INTERFACE,
        VTable::new()
            .method(
                Method::new(
                    "Multiply",
                    Signature::new_const(b"xd"),
                    Signature::new_const(b"d"),
                    move |call, reply| {
                        let (a, b) = call.read_all::<(i64, f64)>()?;
                        calls_in_multiply.fetch_add(1, Ordering::Relaxed);
                        reply.append(&(a as f64 * b))
                    },
                )
                .with_input_names(&["a", "b"])
                .with_output_names(&["product"]),
            )
            .property(
                Property::new("CallCount", Signature::UINT32)
                    .with_getter(move || Variant::new(&calls_in_getter.load(Ordering::Relaxed))),
            ),
    )?;

    object.publish()?;

    println!("serving {NAME} at {PATH}, press ^C to quit");
    connection.enter_event_loop()?;
    Ok(())
}
