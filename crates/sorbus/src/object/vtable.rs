use crate::error::Result;
use crate::{Message, Signature, SignatureBuf, Variant};

use super::ResultSink;

/// How changes of a property value are announced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyUpdate {
    /// `PropertiesChanged` carries the new value.
    #[default]
    EmitsChange,
    /// `PropertiesChanged` only names the property as invalidated;
    /// observers re-read it on demand.
    EmitsInvalidation,
    /// The value never changes for the lifetime of the object.
    Const,
    /// Changes happen without any signal.
    EmitsNoSignal,
}

pub(crate) type SyncHandler = Box<dyn Fn(&mut Message, &mut Message) -> Result<()> + Send + Sync>;
pub(crate) type DeferredHandler = Box<dyn Fn(Message, ResultSink) -> Result<()> + Send + Sync>;
pub(crate) type Getter = Box<dyn Fn() -> Result<Variant> + Send + Sync>;
pub(crate) type Setter = Box<dyn Fn(Variant) -> Result<()> + Send + Sync>;

pub(crate) enum MethodHandler {
    /// Runs on the dispatching thread; the reply (or the error) is
    /// transmitted when it returns.
    Sync(SyncHandler),
    /// Returns immediately; the reply is produced later through the
    /// [`ResultSink`], possibly from another thread.
    Deferred(DeferredHandler),
}

/// The description of one method in a [`VTable`].
pub struct Method {
    pub(crate) name: String,
    pub(crate) in_signature: SignatureBuf,
    pub(crate) out_signature: SignatureBuf,
    pub(crate) in_names: Vec<String>,
    pub(crate) out_names: Vec<String>,
    pub(crate) handler: MethodHandler,
    pub(crate) deprecated: bool,
    pub(crate) privileged: bool,
    pub(crate) no_reply: bool,
}

impl Method {
    /// Describe a method with a synchronous handler.
    ///
    /// The handler receives the incoming call with its cursor at the first
    /// argument, and the empty reply to append results to. Returning an
    /// error transmits an error reply instead.
    pub fn new<F>(name: &str, in_signature: &Signature, out_signature: &Signature, handler: F) -> Self
    where
        F: Fn(&mut Message, &mut Message) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            in_signature: in_signature.to_owned(),
            out_signature: out_signature.to_owned(),
            in_names: Vec::new(),
            out_names: Vec::new(),
            handler: MethodHandler::Sync(Box::new(handler)),
            deprecated: false,
            privileged: false,
            no_reply: false,
        }
    }

    /// Describe a method whose reply is produced after the handler
    /// returns, through the [`ResultSink`] passed to it.
    pub fn with_deferred_handler<F>(
        name: &str,
        in_signature: &Signature,
        out_signature: &Signature,
        handler: F,
    ) -> Self
    where
        F: Fn(Message, ResultSink) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            in_signature: in_signature.to_owned(),
            out_signature: out_signature.to_owned(),
            in_names: Vec::new(),
            out_names: Vec::new(),
            handler: MethodHandler::Deferred(Box::new(handler)),
            deprecated: false,
            privileged: false,
            no_reply: false,
        }
    }

    /// Annotate the method as deprecated in introspection data.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Annotate the method as requiring privileges.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Mark the method as one which never produces a reply.
    #[must_use]
    pub fn no_reply(mut self) -> Self {
        self.no_reply = true;
        self
    }

    /// Name the input arguments for introspection.
    #[must_use]
    pub fn with_input_names(mut self, names: &[&str]) -> Self {
        self.in_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Name the output arguments for introspection.
    #[must_use]
    pub fn with_output_names(mut self, names: &[&str]) -> Self {
        self.out_names = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// The description of one signal in a [`VTable`].
///
/// Signals carry no handler; the entry feeds introspection and lets the
/// signature of emitted signals be verified.
pub struct SignalDef {
    pub(crate) name: String,
    pub(crate) signature: SignatureBuf,
    pub(crate) arg_names: Vec<String>,
    pub(crate) deprecated: bool,
}

impl SignalDef {
    /// Describe a signal and the signature of its payload.
    pub fn new(name: &str, signature: &Signature) -> Self {
        Self {
            name: name.to_string(),
            signature: signature.to_owned(),
            arg_names: Vec::new(),
            deprecated: false,
        }
    }

    /// Annotate the signal as deprecated in introspection data.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Name the signal arguments for introspection.
    #[must_use]
    pub fn with_arg_names(mut self, names: &[&str]) -> Self {
        self.arg_names = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// The description of one property in a [`VTable`].
pub struct Property {
    pub(crate) name: String,
    pub(crate) signature: SignatureBuf,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) update: Option<PropertyUpdate>,
    pub(crate) deprecated: bool,
}

impl Property {
    /// Describe a property of the given signature. Access derives from
    /// which accessors are attached.
    pub fn new(name: &str, signature: &Signature) -> Self {
        Self {
            name: name.to_string(),
            signature: signature.to_owned(),
            getter: None,
            setter: None,
            update: None,
            deprecated: false,
        }
    }

    /// Attach the getter, making the property readable. Getters run
    /// synchronously on the dispatching thread and their value is wrapped
    /// in a [`Variant`].
    #[must_use]
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> Result<Variant> + Send + Sync + 'static,
    {
        self.getter = Some(Box::new(getter));
        self
    }

    /// Attach the setter, making the property writable.
    #[must_use]
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(Variant) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }

    /// Override the interface-wide update behavior for this property.
    #[must_use]
    pub fn update_behavior(mut self, update: PropertyUpdate) -> Self {
        self.update = Some(update);
        self
    }

    /// Annotate the property as deprecated in introspection data.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// The sealed description of everything one interface exposes at an object
/// path: methods, signals, properties and interface-wide flags.
///
/// Once activated on a connection a vtable is immutable; registering an
/// additional vtable (or replacing the whole object) is how interfaces
/// change at runtime.
///
/// # Examples
///
/// ```
/// use sorbus::{Method, Property, Signature, VTable, Variant};
///
/// let vtable = VTable::new()
///     .method(Method::new(
///         "Multiply",
///         Signature::new_const(b"xd"),
///         Signature::new_const(b"d"),
///         |call, reply| {
///             let (a, b) = call.read_all::<(i64, f64)>()?;
///             reply.append(&(a as f64 * b))
///         },
///     ))
///     .property(Property::new("Version", Signature::UINT32).with_getter(|| Variant::new(&4u32)));
/// ```
#[derive(Default)]
pub struct VTable {
    pub(crate) methods: Vec<Method>,
    pub(crate) signals: Vec<SignalDef>,
    pub(crate) properties: Vec<Property>,
    pub(crate) deprecated: bool,
    pub(crate) privileged: bool,
    pub(crate) default_update: PropertyUpdate,
}

impl VTable {
    /// Construct an empty vtable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method entry.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a signal entry.
    #[must_use]
    pub fn signal(mut self, signal: SignalDef) -> Self {
        self.signals.push(signal);
        self
    }

    /// Add a property entry.
    #[must_use]
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Annotate the whole interface as deprecated.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Annotate the whole interface as requiring privileges.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// The update behavior applied to properties which do not override it.
    #[must_use]
    pub fn default_property_update(mut self, update: PropertyUpdate) -> Self {
        self.default_update = update;
        self
    }
}

/// A vtable bound to its interface name, as held in the connection's
/// registry.
pub(crate) struct RegisteredInterface {
    name: String,
    vtable: VTable,
}

impl RegisteredInterface {
    pub(crate) fn new(name: &str, vtable: VTable) -> Self {
        Self {
            name: name.to_string(),
            vtable,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn vtable(&self) -> &VTable {
        &self.vtable
    }

    pub(crate) fn find_method(&self, name: &str) -> Option<&Method> {
        self.vtable.methods.iter().find(|m| m.name == name)
    }

    pub(crate) fn find_property(&self, name: &str) -> Option<&Property> {
        self.vtable.properties.iter().find(|p| p.name == name)
    }

    /// The effective update behavior of a property, falling back to the
    /// interface-wide default.
    pub(crate) fn update_of(&self, property: &Property) -> PropertyUpdate {
        property.update.unwrap_or(self.vtable.default_update)
    }
}
