use anyhow::Result;
use sorbus::{Connection, Proxy};

const NAME: &str = "org.sorbus.Example";
const INTERFACE: &str = "org.sorbus.Example.Calculator";
const PATH: &str = "/org/sorbus/Example/calculator";

fn main() -> Result<()> {
    env_logger::init();

    let connection = Connection::session()?;
    let proxy = Proxy::new(&connection, NAME, PATH)?;

    let (product,): (f64,) = proxy
        .call_method("Multiply")
        .on_interface(INTERFACE)
        .with_arguments(&(21i64, 2.0f64))?
        .get()?;

    println!("21 * 2.0 = {product}");

    let calls: u32 = proxy
        .get_property("CallCount")
        .on_interface(INTERFACE)
        .get()?;

    println!("the server has now served {calls} calls");
    Ok(())
}
