use crate::arg::Args;
use crate::error::{Error, Result};
use crate::{Connection, Message, ObjectPathBuf, Slot};

use super::dispatch::{
    build_interfaces_added, build_interfaces_removed, build_properties_changed,
};
use super::VTable;

/// A server-side object: one object path on a connection carrying one or
/// more activated interface [`VTable`]s.
///
/// Construction only captures parameters. Interfaces are staged with
/// [`add_vtable`] and activated by an explicit, fallible [`publish`]; once
/// published the object is visible to remote callers and further vtables
/// register immediately. Dropping the object (or calling
/// [`remove_from_connection`]) releases all registrations in reverse order.
///
/// [`add_vtable`]: Self::add_vtable
/// [`publish`]: Self::publish
/// [`remove_from_connection`]: Self::remove_from_connection
///
/// # Examples
///
/// ```no_run
/// use sorbus::{Connection, Method, Object, Signature, VTable};
///
/// let connection = Connection::session()?;
/// let mut object = Object::new(&connection, "/org/example/calculator")?;
///
/// object.add_vtable(
///     "org.example.Calculator",
///     VTable::new().method(Method::new(
///         "Multiply",
///         Signature::new_const(b"xd"),
///         Signature::new_const(b"d"),
///         |call, reply| {
///             let (a, b) = call.read_all::<(i64, f64)>()?;
///             reply.append(&(a as f64 * b))
///         },
///     )),
/// )?;
///
/// object.publish()?;
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct Object {
    conn: Connection,
    path: ObjectPathBuf,
    staged: Vec<(String, VTable)>,
    slots: Vec<Slot>,
    manager: Option<Slot>,
    wants_manager: bool,
    published: bool,
}

impl Object {
    /// Capture the parameters of an object at `path`. Nothing is registered
    /// yet; this fails only on an invalid path.
    pub fn new(conn: &Connection, path: impl AsRef<[u8]>) -> Result<Self> {
        let path = ObjectPathBuf::new(path.as_ref())?;

        Ok(Self {
            conn: conn.clone(),
            path,
            staged: Vec::new(),
            slots: Vec::new(),
            manager: None,
            wants_manager: false,
            published: false,
        })
    }

    /// The path of the object.
    pub fn path(&self) -> &crate::ObjectPath {
        &self.path
    }

    /// The connection the object lives on.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Add an interface to the object.
    ///
    /// Before [`publish`], the vtable is staged; afterwards it is
    /// registered immediately, leaving the other interfaces untouched. The
    /// registration is owned by the object either way.
    ///
    /// [`publish`]: Self::publish
    pub fn add_vtable(&mut self, interface: &str, vtable: VTable) -> Result<()> {
        if self.published {
            let slot = self
                .conn
                .add_object_vtable(self.path.as_str(), interface, vtable)?;
            self.slots.push(slot);
        } else {
            self.staged.push((interface.to_string(), vtable));
        }

        Ok(())
    }

    /// Request an object manager at this object's path, registered at
    /// [`publish`] time (or immediately if already published).
    ///
    /// [`publish`]: Self::publish
    pub fn add_object_manager(&mut self) -> Result<()> {
        if self.published {
            self.manager = Some(self.conn.add_object_manager(self.path.as_str())?);
        } else {
            self.wants_manager = true;
        }

        Ok(())
    }

    /// Activate every staged interface, making the object visible to
    /// remote callers.
    ///
    /// On failure nothing stays registered: slots acquired earlier in the
    /// same call are released again.
    pub fn publish(&mut self) -> Result<()> {
        if self.published {
            return Err(Error::failed("object has already been published"));
        }

        let staged = std::mem::take(&mut self.staged);
        let mut slots = Vec::with_capacity(staged.len());

        for (interface, vtable) in staged {
            match self
                .conn
                .add_object_vtable(self.path.as_str(), &interface, vtable)
            {
                Ok(slot) => slots.push(slot),
                Err(error) => {
                    // Dropping the collected slots rolls the registrations
                    // back.
                    drop(slots);
                    return Err(error);
                }
            }
        }

        if self.wants_manager {
            match self.conn.add_object_manager(self.path.as_str()) {
                Ok(slot) => self.manager = Some(slot),
                Err(error) => {
                    drop(slots);
                    return Err(error);
                }
            }
        }

        self.slots = slots;
        self.published = true;
        Ok(())
    }

    /// Test if the object has been published.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Release every registration, leaving the connection itself alive.
    pub fn remove_from_connection(&mut self) {
        while let Some(slot) = self.slots.pop() {
            drop(slot);
        }

        self.manager.take();
        self.published = false;
    }

    /// Start building a signal emitted from this object.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use sorbus::{Connection, Object};
    /// # let connection = Connection::session()?;
    /// # let object = Object::new(&connection, "/org/example/calculator")?;
    /// object
    ///     .emit_signal("Computed")
    ///     .on_interface("org.example.Calculator")
    ///     .with_arguments(&(42.0f64,))?
    ///     .emit()?;
    /// # Ok::<_, sorbus::Error>(())
    /// ```
    pub fn emit_signal(&self, name: &str) -> SignalEmitter<'_> {
        SignalEmitter {
            object: self,
            name: name.to_string(),
            interface: None,
            appends: Vec::new(),
        }
    }

    /// Emit `PropertiesChanged` for the listed properties of `interface`;
    /// an empty list means all of them.
    ///
    /// Properties whose update behavior is `EmitsChange` carry their
    /// current value, `EmitsInvalidation` properties are listed as
    /// invalidated, and `Const`/`EmitsNoSignal` properties are excluded.
    pub fn emit_properties_changed(&self, interface: &str, names: &[&str]) -> Result<()> {
        let signal = build_properties_changed(self.conn.inner(), &self.path, interface, names)?;
        self.conn.send(signal)?;
        Ok(())
    }

    /// Emit `InterfacesAdded` for the listed interfaces of this object; an
    /// empty list means all of them. Requires an object manager at this
    /// path or an ancestor.
    pub fn emit_interfaces_added(&self, interfaces: &[&str]) -> Result<()> {
        let signal = build_interfaces_added(self.conn.inner(), &self.path, interfaces)?;
        self.conn.send(signal)?;
        Ok(())
    }

    /// Emit `InterfacesRemoved` for the listed interfaces of this object;
    /// an empty list means all of them. Requires an object manager at this
    /// path or an ancestor.
    pub fn emit_interfaces_removed(&self, interfaces: &[&str]) -> Result<()> {
        let signal = build_interfaces_removed(self.conn.inner(), &self.path, interfaces)?;
        self.conn.send(signal)?;
        Ok(())
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        self.remove_from_connection();
    }
}

type Appender = Box<dyn FnOnce(&mut Message) -> Result<()>>;

/// Builder for a signal emitted from an [`Object`], produced by
/// [`Object::emit_signal`].
pub struct SignalEmitter<'a> {
    object: &'a Object,
    name: String,
    interface: Option<String>,
    appends: Vec<Appender>,
}

impl SignalEmitter<'_> {
    /// The interface the signal belongs to. Required.
    #[must_use]
    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    /// Append the signal's payload.
    pub fn with_arguments<T>(mut self, args: &T) -> Result<Self>
    where
        T: Args + Clone + Send + 'static,
    {
        let args = args.clone();
        self.appends
            .push(Box::new(move |message| message.append_all(&args)));
        Ok(self)
    }

    /// Build and send the signal.
    pub fn emit(self) -> Result<()> {
        let Some(interface) = self.interface else {
            return Err(Error::failed("signal emission requires an interface"));
        };

        let mut signal = Message::signal(&self.object.path, &interface, &self.name);

        for append in self.appends {
            append(&mut signal)?;
        }

        self.object.conn.send(signal)?;
        Ok(())
    }
}
