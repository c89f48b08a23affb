use std::fmt;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use crate::arg::{Arg, Args};
use crate::error::{name, Error, Result};
use crate::frame::Frame;
use crate::proto::{self, Endianness, Flags};
use crate::signature::SignatureBuilder;
use crate::wire::{self, WireBuf, MAX_ARRAY_LENGTH};
use crate::{MessageKind, ObjectPath, ObjectPathBuf, Serial, Signature, SignatureBuf};

/// The kind of a runtime-typed container in a [`Message`] body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// An ordered sequence of identically typed values.
    Array,
    /// A fixed sequence of heterogeneous values.
    Struct,
    /// A key/value entry inside of an array.
    DictEntry,
    /// A self-describing value carrying its own signature.
    Variant,
}

struct WriteFrame {
    kind: ContainerKind,
    contents: SignatureBuf,
    written: SignatureBuilder,
    len_slot: Option<usize>,
    start: usize,
}

#[derive(Clone)]
struct ReadFrame {
    kind: ContainerKind,
    contents: SignatureBuf,
    sig_off: usize,
    end: Option<usize>,
    start: usize,
    outer: usize,
}

#[derive(Default, Clone)]
struct ReadState {
    pos: usize,
    sig_off: usize,
    frames: Vec<ReadFrame>,
    ok: bool,
}

/// An ordered, typed sequence of values with a read/write cursor, as it
/// travels over the bus.
///
/// A message starts out *building*: values are appended to its end with
/// [`append`] or through runtime containers opened with [`open_container`].
/// Once [sealed], the message is immutable and its values can be read back,
/// iterated, and the cursor [rewound].
///
/// [`append`]: Self::append
/// [`open_container`]: Self::open_container
/// [sealed]: Self::seal
/// [rewound]: Self::rewind
///
/// # Examples
///
/// ```
/// use sorbus::Message;
///
/// let mut m = Message::plain();
/// m.append(&10u16)?;
/// m.append(&"Hello World!".to_string())?;
/// m.seal()?;
///
/// assert_eq!(m.signature(), "qs");
/// assert_eq!(m.read::<u16>()?, 10);
/// assert_eq!(m.read::<String>()?, "Hello World!");
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct Message {
    kind: MessageKind,
    serial: Option<Serial>,
    flags: Flags,
    interface: Option<Box<str>>,
    destination: Option<Box<str>>,
    sender: Option<Box<str>>,
    endianness: Endianness,
    signature: SignatureBuilder,
    body: WireBuf,
    fds: Vec<Arc<OwnedFd>>,
    sealed: bool,
    write: Vec<WriteFrame>,
    read: ReadState,
}

impl Message {
    fn with_kind(kind: MessageKind) -> Self {
        Self {
            kind,
            serial: None,
            flags: Flags::EMPTY,
            interface: None,
            destination: None,
            sender: None,
            endianness: Endianness::NATIVE,
            signature: SignatureBuilder::new(),
            body: WireBuf::new(),
            fds: Vec::new(),
            sealed: false,
            write: Vec::new(),
            read: ReadState::default(),
        }
    }

    /// Construct a freestanding [`MessageKind::Plain`] message used as a
    /// value carrier.
    pub fn plain() -> Self {
        Self::with_kind(MessageKind::Plain)
    }

    /// Construct a method call message.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::{Message, MessageKind, ObjectPath};
    ///
    /// const PATH: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");
    ///
    /// let m = Message::method_call(PATH, "Hello")
    ///     .with_interface("org.freedesktop.DBus")
    ///     .with_destination("org.freedesktop.DBus");
    ///
    /// assert!(matches!(m.kind(), MessageKind::MethodCall { .. }));
    /// ```
    pub fn method_call(path: &ObjectPath, member: &str) -> Self {
        Self::with_kind(MessageKind::MethodCall {
            path: path.to_owned(),
            member: member.into(),
        })
    }

    /// Construct a signal message.
    pub fn signal(path: &ObjectPath, interface: &str, member: &str) -> Self {
        Self::with_kind(MessageKind::Signal {
            path: path.to_owned(),
            member: member.into(),
        })
        .with_interface(interface)
    }

    /// Construct an empty method return whose header links back to this
    /// call's serial.
    ///
    /// Errors unless `self` is a method call that has been assigned a
    /// serial, i.e. one which has actually been received over a connection.
    pub fn create_reply(&self) -> Result<Message> {
        let MessageKind::MethodCall { .. } = &self.kind else {
            return Err(state_error("only method calls can be replied to"));
        };

        let reply_serial = self
            .serial
            .ok_or_else(|| state_error("method call carries no serial"))?;

        let mut m = Self::with_kind(MessageKind::MethodReturn { reply_serial });
        m.destination = self.sender.clone();
        Ok(m)
    }

    /// Construct an error reply whose header links back to this call's
    /// serial and whose body carries the error message.
    pub fn create_error_reply(&self, error: &Error) -> Result<Message> {
        let MessageKind::MethodCall { .. } = &self.kind else {
            return Err(state_error("only method calls can be replied to"));
        };

        let reply_serial = self
            .serial
            .ok_or_else(|| state_error("method call carries no serial"))?;

        let mut m = Self::with_kind(MessageKind::Error {
            error_name: error.error_name().into(),
            reply_serial,
        });

        m.destination = self.sender.clone();
        m.append(&error.message().to_string())?;
        Ok(m)
    }

    /// Construct an incoming message from decoded wire parts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_wire_parts(
        kind: MessageKind,
        serial: Serial,
        flags: Flags,
        interface: Option<Box<str>>,
        destination: Option<Box<str>>,
        sender: Option<Box<str>>,
        endianness: Endianness,
        signature: SignatureBuf,
        body: WireBuf,
    ) -> Self {
        let mut read = ReadState::default();
        read.ok = true;

        Self {
            kind,
            serial: Some(serial),
            flags,
            interface,
            destination,
            sender,
            endianness,
            signature: SignatureBuilder::from_signature(&signature),
            body,
            fds: Vec::new(),
            sealed: true,
            write: Vec::new(),
            read,
        }
    }

    /// Get the kind of the message.
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// The serial of the message, present once it has been sent or
    /// received.
    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    pub(crate) fn set_serial(&mut self, serial: Serial) {
        self.serial = Some(serial);
    }

    /// The flags of the message.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The path of a method call or signal message.
    pub fn path(&self) -> Option<&ObjectPath> {
        match &self.kind {
            MessageKind::MethodCall { path, .. } => Some(path),
            MessageKind::Signal { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The member of a method call or signal message.
    pub fn member(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::MethodCall { member, .. } => Some(member),
            MessageKind::Signal { member, .. } => Some(member),
            _ => None,
        }
    }

    /// The serial the message replies to, for replies and errors.
    pub fn reply_serial(&self) -> Option<Serial> {
        match &self.kind {
            MessageKind::MethodReturn { reply_serial } => Some(*reply_serial),
            MessageKind::Error { reply_serial, .. } => Some(*reply_serial),
            _ => None,
        }
    }

    /// The error name of an error reply.
    pub fn error_name(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Error { error_name, .. } => Some(error_name),
            _ => None,
        }
    }

    /// The interface of the message, if any.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Modify the interface of the message.
    #[must_use]
    pub fn with_interface<S>(mut self, interface: S) -> Self
    where
        S: AsRef<str>,
    {
        self.interface = Some(interface.as_ref().into());
        self
    }

    /// The destination of the message, if any.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Modify the destination of the message.
    #[must_use]
    pub fn with_destination<S>(mut self, destination: S) -> Self
    where
        S: AsRef<str>,
    {
        self.destination = Some(destination.as_ref().into());
        self
    }

    /// The sender of the message, if any. On a message bus this field is
    /// controlled by the bus.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub(crate) fn set_sender(&mut self, sender: Option<&str>) {
        self.sender = sender.map(Box::from);
    }

    /// Test if the message is flagged as not expecting a reply.
    pub fn no_reply_expected(&self) -> bool {
        self.flags.contains(Flags::NO_REPLY_EXPECTED)
    }

    /// Flag the message as not expecting a reply.
    pub fn set_no_reply_expected(&mut self, no_reply: bool) {
        if no_reply {
            self.flags.insert(Flags::NO_REPLY_EXPECTED);
        } else {
            self.flags.remove(Flags::NO_REPLY_EXPECTED);
        }
    }

    /// The signature describing the values in the message body.
    pub fn signature(&self) -> &Signature {
        self.signature.to_signature()
    }

    /// The endianness of the message body.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Test if the message has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The *ok* flag of the message.
    ///
    /// Reading past the last element of a container (or of the message)
    /// clears this flag, which is how iterative readers detect the end of a
    /// container without a separate probe. It is restored by
    /// [`exit_container`] and [`rewind`].
    ///
    /// [`exit_container`]: Self::exit_container
    /// [`rewind`]: Self::rewind
    pub fn ok(&self) -> bool {
        self.read.ok
    }

    /// Seal the message.
    ///
    /// This is a one-way transition which makes the message immutable and
    /// readable. Sealing fails if any containers are still open for
    /// writing.
    pub fn seal(&mut self) -> Result<()> {
        if !self.write.is_empty() {
            return Err(state_error("cannot seal message with open containers"));
        }

        self.sealed = true;
        self.read = ReadState::default();
        self.read.ok = true;
        Ok(())
    }

    /// Reset an unsealed message to its pristine building state, dropping
    /// everything appended so far.
    pub fn reset(&mut self) {
        if self.sealed {
            return;
        }

        self.body.clear();
        self.signature.clear();
        self.fds.clear();
        self.write.clear();
    }

    /// Rewind the read cursor.
    ///
    /// With `complete` set, the cursor is reset to the first element of the
    /// message and all entered containers are left. Otherwise only the
    /// innermost entered container is rewound to its first element.
    pub fn rewind(&mut self, complete: bool) -> Result<()> {
        self.check_readable()?;

        if complete || self.read.frames.is_empty() {
            let ok = true;
            self.read = ReadState::default();
            self.read.ok = ok;
        } else {
            let frame = self.read.frames.last_mut().expect("non-empty frames");
            self.read.pos = frame.start;
            frame.sig_off = 0;
            self.read.ok = true;
        }

        Ok(())
    }

    /// Append a typed value to the message.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::Message;
    ///
    /// let mut m = Message::plain();
    /// m.append(&true)?;
    /// m.append(&vec![1u32, 2, 3])?;
    ///
    /// assert_eq!(m.signature(), "bau");
    /// # Ok::<_, sorbus::Error>(())
    /// ```
    pub fn append<T>(&mut self, value: &T) -> Result<()>
    where
        T: Arg,
    {
        self.check_writable()?;

        let mut builder = SignatureBuilder::new();
        T::signature(&mut builder)?;
        self.note_written(builder.to_signature())?;
        value.append(self)
    }

    /// Append a tuple of values as separate top-level arguments.
    ///
    /// Unlike appending the tuple as a single value this does not wrap the
    /// values in a struct.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::Message;
    ///
    /// let mut m = Message::plain();
    /// m.append_all(&(5i64, 2.0f64))?;
    ///
    /// assert_eq!(m.signature(), "xd");
    /// # Ok::<_, sorbus::Error>(())
    /// ```
    pub fn append_all<T>(&mut self, args: &T) -> Result<()>
    where
        T: Args,
    {
        args.append_to(self)
    }

    /// Open a container for writing.
    ///
    /// The `contents` signature declares what the container holds: the
    /// element type for arrays, the field types for structs, key and value
    /// types for dict entries and the single contained type for variants.
    /// Writes inside the container must conform, which is verified when the
    /// container is closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::{ContainerKind, Message, Signature};
    ///
    /// let mut m = Message::plain();
    ///
    /// m.open_container(ContainerKind::Array, Signature::new(b"u")?)?;
    /// m.append(&1u32)?;
    /// m.append(&2u32)?;
    /// m.close_container()?;
    ///
    /// assert_eq!(m.signature(), "au");
    /// # Ok::<_, sorbus::Error>(())
    /// ```
    pub fn open_container(&mut self, kind: ContainerKind, contents: &Signature) -> Result<()> {
        self.check_writable()?;

        match kind {
            ContainerKind::Array => {
                let full = concat_signature(&[b"a", contents.as_bytes()])?;
                self.note_written(&full)?;

                let len_slot = self.body.alloc_u32();
                self.body.align_for(element_alignment(contents));
                let start = self.body.len();

                self.write.push(WriteFrame {
                    kind,
                    contents: contents.to_owned(),
                    written: SignatureBuilder::new(),
                    len_slot: Some(len_slot),
                    start,
                });
            }
            ContainerKind::Struct => {
                let full = concat_signature(&[b"(", contents.as_bytes(), b")"])?;
                self.note_written(&full)?;

                self.body.align_for(8);
                let start = self.body.len();

                self.write.push(WriteFrame {
                    kind,
                    contents: contents.to_owned(),
                    written: SignatureBuilder::new(),
                    len_slot: None,
                    start,
                });
            }
            ContainerKind::DictEntry => {
                // Validated as part of an enclosing array since a dict entry
                // cannot appear anywhere else.
                let _ = concat_signature(&[b"a{", contents.as_bytes(), b"}"])?;

                if !matches!(
                    self.write.last().map(|f| f.kind),
                    Some(ContainerKind::Array)
                ) {
                    return Err(state_error("dict entry must be opened inside an array"));
                }

                let full = concat_unchecked(&[b"{", contents.as_bytes(), b"}"]);
                self.note_written(full.to_signature())?;

                self.body.align_for(8);
                let start = self.body.len();

                self.write.push(WriteFrame {
                    kind,
                    contents: contents.to_owned(),
                    written: SignatureBuilder::new(),
                    len_slot: None,
                    start,
                });
            }
            ContainerKind::Variant => {
                if !contents.is_single_complete_type() {
                    return Err(Error::new(
                        name::INVALID_ARGS,
                        "variant contents must be a single complete type",
                    ));
                }

                self.note_written(Signature::VARIANT)?;
                self.write_signature_raw(contents);
                let start = self.body.len();

                self.write.push(WriteFrame {
                    kind,
                    contents: contents.to_owned(),
                    written: SignatureBuilder::new(),
                    len_slot: None,
                    start,
                });
            }
        }

        Ok(())
    }

    /// Close the innermost container opened for writing.
    ///
    /// Fails if any writes inside the container violated its declared
    /// contents signature.
    pub fn close_container(&mut self) -> Result<()> {
        self.check_writable()?;

        let frame = self
            .write
            .pop()
            .ok_or_else(|| state_error("no container is open"))?;

        let written = frame.written.to_signature();

        match frame.kind {
            ContainerKind::Array => {
                if !is_repetition(written, &frame.contents) {
                    self.write.push(frame);
                    return Err(Error::new(
                        name::INVALID_ARGS,
                        "array elements do not match the declared element type",
                    ));
                }

                let len = self.body.len() - frame.start;

                if len > MAX_ARRAY_LENGTH as usize {
                    return Err(Error::new(name::INVALID_ARGS, "array is too long"));
                }

                let slot = frame.len_slot.expect("array frame has a length slot");
                self.body.store_at(slot, len as u32, self.endianness);
            }
            ContainerKind::Struct | ContainerKind::DictEntry | ContainerKind::Variant => {
                if written != &*frame.contents {
                    let what = match frame.kind {
                        ContainerKind::Struct => "struct fields",
                        ContainerKind::DictEntry => "dict entry fields",
                        _ => "variant contents",
                    };

                    self.write.push(frame);

                    return Err(Error::new(
                        name::INVALID_ARGS,
                        format!("{what} do not match the declared signature"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Read a typed value at the read cursor, advancing it by exactly the
    /// value's wire extent.
    ///
    /// If the next element does not match the type being read this fails
    /// with an `org.freedesktop.DBus.Error.InvalidArgs` error and the
    /// cursor is left where it was.
    pub fn read<T>(&mut self) -> Result<T>
    where
        T: Arg,
    {
        match self.try_read::<T>()? {
            Some(value) => Ok(value),
            None => Err(Error::new(name::INVALID_ARGS, "no more elements to read")),
        }
    }

    /// Read a typed value, or `None` when the current container (or the
    /// message) has no elements left.
    ///
    /// Reaching the end also clears the message's [`ok`] flag.
    ///
    /// [`ok`]: Self::ok
    pub fn try_read<T>(&mut self) -> Result<Option<T>>
    where
        T: Arg,
    {
        self.check_readable()?;

        let Some(actual) = self.next_value_signature() else {
            self.read.ok = false;
            return Ok(None);
        };

        let mut builder = SignatureBuilder::new();
        T::signature(&mut builder)?;
        let expected = builder.to_signature();

        if &*actual != expected {
            return Err(type_mismatch(expected, &actual));
        }

        let value = T::read(self)?;
        self.advance_signature(actual.len());
        Ok(Some(value))
    }

    /// Read a tuple of values as separate top-level arguments.
    pub fn read_all<T>(&mut self) -> Result<T>
    where
        T: Args,
    {
        T::read_from(self)
    }

    /// Peek at the type of the next element without consuming it.
    ///
    /// Returns the primary type code and, for containers, the contents
    /// signature. Returns `None` at the end of the current container or
    /// message.
    pub fn peek_type(&self) -> Result<Option<(proto::Type, Option<SignatureBuf>)>> {
        self.check_readable()?;

        let Some(sig) = self.next_value_signature() else {
            return Ok(None);
        };

        let bytes = sig.as_bytes();

        let item = match bytes[0] {
            b'a' => (
                proto::Type::ARRAY,
                // SAFETY: The tail of an array signature is its element
                // signature which is valid on its own.
                Some(unsafe { Signature::new_unchecked(&bytes[1..]).to_owned() }),
            ),
            b'(' => (proto::Type::STRUCT, Some(inner_signature(&sig))),
            b'{' => (proto::Type::DICT_ENTRY, Some(inner_signature(&sig))),
            b'v' => {
                let mut pos = self.read.pos;
                let contents = self.peek_variant_signature(&mut pos)?;
                (proto::Type::VARIANT, Some(contents))
            }
            b => (proto::Type::from_raw(b), None),
        };

        Ok(Some(item))
    }

    /// Enter a container for reading.
    ///
    /// `contents` declares the expected contents; pass the empty signature
    /// to accept whatever the container holds, which can subsequently be
    /// inspected with [`peek_type`].
    ///
    /// [`peek_type`]: Self::peek_type
    pub fn enter_container(&mut self, kind: ContainerKind, contents: &Signature) -> Result<()> {
        self.check_readable()?;

        let Some(actual) = self.next_value_signature() else {
            self.read.ok = false;
            return Err(Error::new(name::INVALID_ARGS, "no container to enter"));
        };

        let bytes = actual.as_bytes();
        let outer = actual.len();

        match kind {
            ContainerKind::Array => {
                if bytes[0] != b'a' {
                    return Err(not_a_container("an array", &actual));
                }

                // SAFETY: Element type of a valid array signature.
                let elems = unsafe { Signature::new_unchecked(&bytes[1..]) };

                if !contents.is_empty() && contents != elems {
                    return Err(type_mismatch(contents, elems));
                }

                let mut pos = self.read.pos;
                let len = wire::read_frame::<u32>(self.body.get(), &mut pos, self.endianness)?
                    as usize;
                pos += wire::padding_to(element_alignment(elems), pos);

                if pos + len > self.body.len() {
                    return Err(state_error("array extends past the end of the body"));
                }

                self.read.pos = pos;
                self.read.frames.push(ReadFrame {
                    kind,
                    contents: elems.to_owned(),
                    sig_off: 0,
                    end: Some(pos + len),
                    start: pos,
                    outer,
                });
            }
            ContainerKind::Struct => {
                if bytes[0] != b'(' {
                    return Err(not_a_container("a struct", &actual));
                }

                let inner = inner_signature(&actual);

                if !contents.is_empty() && contents != &*inner {
                    return Err(type_mismatch(contents, &inner));
                }

                let mut pos = self.read.pos;
                pos += wire::padding_to(8, pos);

                self.read.pos = pos;
                self.read.frames.push(ReadFrame {
                    kind,
                    contents: inner,
                    sig_off: 0,
                    end: None,
                    start: pos,
                    outer,
                });
            }
            ContainerKind::DictEntry => {
                if bytes[0] != b'{' {
                    return Err(not_a_container("a dict entry", &actual));
                }

                let inner = inner_signature(&actual);

                if !contents.is_empty() && contents != &*inner {
                    return Err(type_mismatch(contents, &inner));
                }

                let mut pos = self.read.pos;
                pos += wire::padding_to(8, pos);

                self.read.pos = pos;
                self.read.frames.push(ReadFrame {
                    kind,
                    contents: inner,
                    sig_off: 0,
                    end: None,
                    start: pos,
                    outer,
                });
            }
            ContainerKind::Variant => {
                if bytes[0] != b'v' {
                    return Err(not_a_container("a variant", &actual));
                }

                let saved = self.read.pos;
                let mut pos = self.read.pos;
                let inner = self.peek_variant_signature(&mut pos)?;

                if !contents.is_empty() && contents != &*inner {
                    self.read.pos = saved;
                    return Err(type_mismatch(contents, &inner));
                }

                self.read.pos = pos;
                self.read.frames.push(ReadFrame {
                    kind,
                    contents: inner,
                    sig_off: 0,
                    end: None,
                    start: pos,
                    outer,
                });
            }
        }

        Ok(())
    }

    /// Exit the innermost entered container, leaving the cursor at the
    /// container's boundary and restoring the [`ok`] flag.
    ///
    /// Elements not read are skipped.
    ///
    /// [`ok`]: Self::ok
    pub fn exit_container(&mut self) -> Result<()> {
        self.check_readable()?;

        let frame = self
            .read
            .frames
            .pop()
            .ok_or_else(|| state_error("no container has been entered"))?;

        match frame.end {
            Some(end) => {
                self.read.pos = end;
            }
            None => {
                // Skip whatever fields remain unread.
                let mut remainder = suffix(&frame.contents, frame.sig_off);

                loop {
                    let Some((head, tail)) = remainder.split_first() else {
                        break;
                    };

                    let tail = tail.to_owned();
                    self.skip_value(head)?;
                    remainder = tail;
                }
            }
        }

        self.advance_signature(frame.outer);
        self.read.ok = true;
        Ok(())
    }

    /// Append every value of another sealed message's body to this one.
    ///
    /// Both messages must use the same endianness and this message must not
    /// have any containers open.
    pub fn copy_body_to(&self, dest: &mut Message) -> Result<()> {
        self.check_readable()?;
        dest.check_writable()?;

        if !dest.write.is_empty() {
            return Err(state_error("cannot copy into a message with open containers"));
        }

        if dest.endianness != self.endianness {
            return Err(Error::new(
                name::NOT_SUPPORTED,
                "cannot copy between messages of differing endianness",
            ));
        }

        dest.note_written(self.signature())?;
        dest.body.align_for(8);
        dest.body.extend_from_slice(self.body.get());
        dest.fds.extend(self.fds.iter().cloned());
        Ok(())
    }

    /// Align the write cursor for the fields of a struct value. Used by
    /// derived [`Arg`] implementations.
    ///
    /// [`Arg`]: crate::Arg
    #[doc(hidden)]
    pub fn begin_struct_write(&mut self) {
        self.body.align_for(8);
    }

    /// Align the read cursor for the fields of a struct value. Used by
    /// derived [`Arg`] implementations.
    ///
    /// [`Arg`]: crate::Arg
    #[doc(hidden)]
    pub fn begin_struct_read(&mut self) -> Result<()> {
        self.align_read(8)
    }

    // ------------------------------------------------------------------
    // Raw value plumbing used by `Arg` implementations. These operate below
    // the signature bookkeeping which `append`/`read` perform.
    // ------------------------------------------------------------------

    pub(crate) fn write_frame_raw<T>(&mut self, frame: T)
    where
        T: Frame,
    {
        self.body.store_frame(frame, self.endianness);
    }

    pub(crate) fn write_string_raw(&mut self, string: &str) {
        self.body
            .store_frame(string.len() as u32, self.endianness);
        self.body.extend_from_slice_nul(string.as_bytes());
    }

    pub(crate) fn write_signature_raw(&mut self, signature: &Signature) {
        self.body.store_frame(signature.len() as u8, self.endianness);
        self.body.extend_from_slice_nul(signature.as_bytes());
    }

    pub(crate) fn open_array_raw(&mut self, elements: &Signature) -> RawArrayWriter {
        let len_slot = self.body.alloc_u32();
        self.body.align_for(element_alignment(elements));

        RawArrayWriter {
            len_slot,
            start: self.body.len(),
        }
    }

    pub(crate) fn close_array_raw(&mut self, writer: RawArrayWriter) -> Result<()> {
        let len = self.body.len() - writer.start;

        if len > MAX_ARRAY_LENGTH as usize {
            return Err(Error::new(name::INVALID_ARGS, "array is too long"));
        }

        self.body.store_at(writer.len_slot, len as u32, self.endianness);
        Ok(())
    }

    pub(crate) fn align_write(&mut self, align: usize) {
        self.body.align_for(align);
    }

    pub(crate) fn push_fd(&mut self, fd: Arc<OwnedFd>) -> u32 {
        let index = self.fds.len() as u32;
        self.fds.push(fd);
        index
    }

    pub(crate) fn fd_at(&self, index: u32) -> Result<Arc<OwnedFd>> {
        self.fds
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::new(name::INCONSISTENT_MESSAGE, "file descriptor index out of range"))
    }

    pub(crate) fn read_frame_raw<T>(&mut self) -> Result<T>
    where
        T: Frame,
    {
        let at_end = self.read_limit();
        let mut pos = self.read.pos;
        let value = wire::read_frame::<T>(&self.body.get()[..at_end], &mut pos, self.endianness)?;
        self.read.pos = pos;
        Ok(value)
    }

    pub(crate) fn read_string_raw(&mut self) -> Result<String> {
        let at_end = self.read_limit();
        let bytes = self.body.get();
        let mut pos = self.read.pos;
        let len = wire::read_frame::<u32>(&bytes[..at_end], &mut pos, self.endianness)? as usize;
        let slice = wire::read_slice_nul(&bytes[..at_end], &mut pos, len)?;
        let string = core::str::from_utf8(slice)
            .map_err(|_| Error::new(name::INCONSISTENT_MESSAGE, "string is not valid UTF-8"))?
            .to_owned();
        self.read.pos = pos;
        Ok(string)
    }

    pub(crate) fn read_signature_raw(&mut self) -> Result<SignatureBuf> {
        let at_end = self.read_limit();
        let bytes = self.body.get();
        let mut pos = self.read.pos;
        let len = wire::read_frame::<u8>(&bytes[..at_end], &mut pos, self.endianness)? as usize;
        let slice = wire::read_slice_nul(&bytes[..at_end], &mut pos, len)?;
        let signature = SignatureBuf::new(slice)?;
        self.read.pos = pos;
        Ok(signature)
    }

    pub(crate) fn read_path_raw(&mut self) -> Result<ObjectPathBuf> {
        let string = self.read_string_raw()?;
        Ok(ObjectPathBuf::new(string.as_str())?)
    }

    pub(crate) fn enter_array_raw(&mut self, elements: &Signature) -> Result<RawArrayReader> {
        let at_end = self.read_limit();
        let mut pos = self.read.pos;
        let len =
            wire::read_frame::<u32>(&self.body.get()[..at_end], &mut pos, self.endianness)? as usize;
        pos += wire::padding_to(element_alignment(elements), pos);

        if pos + len > self.body.len() {
            return Err(state_error("array extends past the end of the body"));
        }

        self.read.pos = pos;
        Ok(RawArrayReader { end: pos + len })
    }

    pub(crate) fn array_raw_at_end(&self, reader: &RawArrayReader) -> bool {
        self.read.pos >= reader.end
    }

    pub(crate) fn align_read(&mut self, align: usize) -> Result<()> {
        let pos = self.read.pos + wire::padding_to(align, self.read.pos);

        if pos > self.body.len() {
            return Err(state_error("message body ended inside padding"));
        }

        self.read.pos = pos;
        Ok(())
    }

    // ------------------------------------------------------------------

    /// The read limit imposed by the innermost entered array, if any.
    fn read_limit(&self) -> usize {
        for frame in self.read.frames.iter().rev() {
            if let Some(end) = frame.end {
                return end;
            }
        }

        self.body.len()
    }

    /// The signature of the next unread value, or `None` at the end of the
    /// current container or message.
    fn next_value_signature(&self) -> Option<SignatureBuf> {
        match self.read.frames.last() {
            Some(frame) => match frame.kind {
                ContainerKind::Array => {
                    let end = frame.end.expect("array frame has an end");

                    if self.read.pos >= end {
                        None
                    } else {
                        Some(frame.contents.clone())
                    }
                }
                _ => {
                    let remainder = suffix(&frame.contents, frame.sig_off);
                    let (head, _) = remainder.split_first()?;
                    Some(head.to_owned())
                }
            },
            None => {
                let remainder = suffix(self.signature.to_signature(), self.read.sig_off);
                let (head, _) = remainder.split_first()?;
                Some(head.to_owned())
            }
        }
    }

    fn advance_signature(&mut self, consumed: usize) {
        match self.read.frames.last_mut() {
            Some(frame) => {
                if !matches!(frame.kind, ContainerKind::Array) {
                    frame.sig_off += consumed;
                }
            }
            None => {
                self.read.sig_off += consumed;
            }
        }
    }

    fn note_written(&mut self, signature: &Signature) -> Result<()> {
        let target = match self.write.last_mut() {
            Some(frame) => &mut frame.written,
            None => &mut self.signature,
        };

        if !target.extend_from_signature(signature) {
            return Err(crate::SignatureError::too_long().into());
        }

        Ok(())
    }

    fn peek_variant_signature(&self, pos: &mut usize) -> Result<SignatureBuf> {
        let bytes = self.body.get();
        let len = wire::read_frame::<u8>(bytes, pos, self.endianness)? as usize;
        let slice = wire::read_slice_nul(bytes, pos, len)?;
        let signature = SignatureBuf::new(slice)?;

        if !signature.is_single_complete_type() {
            return Err(Error::new(
                name::INCONSISTENT_MESSAGE,
                "variant signature is not a single complete type",
            ));
        }

        Ok(signature)
    }

    /// Advance the read cursor over one complete unread value.
    fn skip_value(&mut self, sig: &Signature) -> Result<()> {
        let bytes = sig.as_bytes();

        match bytes[0] {
            b'y' => {
                self.read_frame_raw::<u8>()?;
            }
            b'n' | b'q' => {
                self.read_frame_raw::<u16>()?;
            }
            b'b' | b'i' | b'u' | b'h' => {
                self.read_frame_raw::<u32>()?;
            }
            b'x' | b't' | b'd' => {
                self.read_frame_raw::<u64>()?;
            }
            b's' | b'o' => {
                self.read_string_raw()?;
            }
            b'g' => {
                self.read_signature_raw()?;
            }
            b'v' => {
                let mut pos = self.read.pos;
                let inner = self.peek_variant_signature(&mut pos)?;
                self.read.pos = pos;
                self.skip_value(&inner)?;
            }
            b'a' => {
                // SAFETY: Element type of a valid array signature.
                let elems = unsafe { Signature::new_unchecked(&bytes[1..]) };
                let len = self.read_frame_raw::<u32>()? as usize;
                self.align_read(element_alignment(elems))?;

                if self.read.pos + len > self.body.len() {
                    return Err(state_error("array extends past the end of the body"));
                }

                self.read.pos += len;
            }
            b'(' | b'{' => {
                self.align_read(8)?;
                let mut remainder = inner_signature(sig);

                loop {
                    let Some((head, tail)) = remainder.split_first() else {
                        break;
                    };

                    let tail = tail.to_owned();
                    self.skip_value(head)?;
                    remainder = tail;
                }
            }
            _ => {
                return Err(Error::new(
                    name::INCONSISTENT_MESSAGE,
                    "cannot skip unknown type",
                ));
            }
        }

        Ok(())
    }

    /// Copy one complete value of type `sig` from the read cursor of `src`
    /// to the write cursor of this message, below signature bookkeeping.
    ///
    /// This re-serializes rather than splicing bytes so that padding is
    /// recomputed against the destination offsets.
    pub(crate) fn append_value_from(&mut self, src: &mut Message, sig: &Signature) -> Result<()> {
        let bytes = sig.as_bytes();

        match bytes[0] {
            b'y' => {
                let v = src.read_frame_raw::<u8>()?;
                self.write_frame_raw(v);
            }
            b'n' | b'q' => {
                let v = src.read_frame_raw::<u16>()?;
                self.write_frame_raw(v);
            }
            b'b' | b'i' | b'u' => {
                let v = src.read_frame_raw::<u32>()?;
                self.write_frame_raw(v);
            }
            b'x' | b't' | b'd' => {
                let v = src.read_frame_raw::<u64>()?;
                self.write_frame_raw(v);
            }
            b'h' => {
                let index = src.read_frame_raw::<u32>()?;
                let fd = src.fd_at(index)?;
                let index = self.push_fd(fd);
                self.write_frame_raw(index);
            }
            b's' | b'o' => {
                let v = src.read_string_raw()?;
                self.write_string_raw(&v);
            }
            b'g' => {
                let v = src.read_signature_raw()?;
                self.write_signature_raw(&v);
            }
            b'v' => {
                let mut pos = src.read.pos;
                let inner = src.peek_variant_signature(&mut pos)?;
                src.read.pos = pos;
                self.write_signature_raw(&inner);
                self.append_value_from(src, &inner)?;
            }
            b'a' => {
                // SAFETY: Element type of a valid array signature.
                let elems = unsafe { Signature::new_unchecked(&bytes[1..]) }.to_owned();
                let reader = src.enter_array_raw(&elems)?;
                let writer = self.open_array_raw(&elems);

                while !src.array_raw_at_end(&reader) {
                    self.append_value_from(src, &elems)?;
                }

                self.close_array_raw(writer)?;
            }
            b'(' | b'{' => {
                src.align_read(8)?;
                self.align_write(8);
                let mut remainder = inner_signature(sig);

                loop {
                    let Some((head, tail)) = remainder.split_first() else {
                        break;
                    };

                    let head = head.to_owned();
                    let tail = tail.to_owned();
                    self.append_value_from(src, &head)?;
                    remainder = tail;
                }
            }
            _ => {
                return Err(Error::new(
                    name::INCONSISTENT_MESSAGE,
                    "cannot copy unknown type",
                ));
            }
        }

        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.sealed {
            return Err(state_error("message is sealed"));
        }

        Ok(())
    }

    fn check_readable(&self) -> Result<()> {
        if !self.sealed {
            return Err(state_error("message has not been sealed"));
        }

        Ok(())
    }

    pub(crate) fn body_bytes(&self) -> &[u8] {
        self.body.get()
    }

    pub(crate) fn fd_count(&self) -> usize {
        self.fds.len()
    }
}

pub(crate) struct RawArrayWriter {
    len_slot: usize,
    start: usize,
}

pub(crate) struct RawArrayReader {
    end: usize,
}

fn state_error(message: &str) -> Error {
    Error::new(name::INCONSISTENT_MESSAGE, message)
}

fn type_mismatch(expected: &Signature, actual: &Signature) -> Error {
    Error::new(
        name::INVALID_ARGS,
        format!("expected element of type {expected}, but next element is {actual}"),
    )
}

fn not_a_container(expected: &str, actual: &Signature) -> Error {
    Error::new(
        name::INVALID_ARGS,
        format!("expected {expected}, but next element is {actual}"),
    )
}

/// The wire alignment of the first element of the given signature.
fn element_alignment(signature: &Signature) -> usize {
    match signature.as_bytes().first() {
        Some(&b) => proto::Type::from_raw(b).alignment(),
        None => 1,
    }
}

/// The contents of a struct or dict entry signature, with the enclosing
/// delimiters stripped.
fn inner_signature(signature: &Signature) -> SignatureBuf {
    let bytes = signature.as_bytes();
    // SAFETY: The contents of a valid struct or dict entry signature are a
    // valid signature on their own.
    unsafe { Signature::new_unchecked(&bytes[1..bytes.len() - 1]).to_owned() }
}

/// A suffix of a signature starting at a complete type boundary.
fn suffix(signature: &Signature, off: usize) -> SignatureBuf {
    // SAFETY: Offsets tracked by the read cursor always sit at complete type
    // boundaries.
    unsafe { Signature::new_unchecked(&signature.as_bytes()[off..]).to_owned() }
}

fn concat_signature(parts: &[&[u8]]) -> Result<SignatureBuf> {
    let buf = concat_parts(parts);
    Ok(SignatureBuf::new(&buf)?)
}

fn concat_unchecked(parts: &[&[u8]]) -> SignatureBuilder {
    let buf = concat_parts(parts);
    let mut builder = SignatureBuilder::new();
    // SAFETY: Callers only pass fragments which concatenate into a valid
    // signature in their context of use.
    let signature = unsafe { Signature::new_unchecked(&buf) };
    let _ = builder.extend_from_signature(signature);
    builder
}

fn concat_parts(parts: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());

    for part in parts {
        buf.extend_from_slice(part);
    }

    buf
}

/// Test if `written` is zero or more repetitions of `unit`.
fn is_repetition(written: &Signature, unit: &Signature) -> bool {
    let unit = unit.as_bytes();

    if unit.is_empty() {
        return written.is_empty();
    }

    let written = written.as_bytes();

    if written.len() % unit.len() != 0 {
        return false;
    }

    written.chunks(unit.len()).all(|chunk| chunk == unit)
}

impl Clone for Message {
    fn clone(&self) -> Self {
        let mut read = ReadState::default();
        read.ok = self.sealed;

        Self {
            kind: self.kind.clone(),
            serial: self.serial,
            flags: self.flags,
            interface: self.interface.clone(),
            destination: self.destination.clone(),
            sender: self.sender.clone(),
            endianness: self.endianness,
            signature: self.signature.clone(),
            body: self.body.clone(),
            fds: self.fds.clone(),
            sealed: self.sealed,
            // Write frames are not cloneable as a unit, but a message with
            // open containers is mid-construction and does not travel.
            write: Vec::new(),
            read,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("serial", &self.serial)
            .field("flags", &self.flags)
            .field("interface", &self.interface)
            .field("destination", &self.destination)
            .field("sender", &self.sender)
            .field("signature", &self.signature.to_signature())
            .field("body", &self.body)
            .finish()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.serial == other.serial
            && self.flags == other.flags
            && self.interface == other.interface
            && self.destination == other.destination
            && self.sender == other.sender
            && self.signature.to_signature() == other.signature.to_signature()
            && self.body == other.body
    }
}
