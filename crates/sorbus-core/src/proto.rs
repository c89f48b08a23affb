//! Low level constants of the D-Bus wire protocol.

wire_enum! {
    /// The endianness of a message.
    #[repr(u8)]
    pub enum Endianness {
        /// Little endian.
        LITTLE = b'l',
        /// Big endian.
        BIG = b'B',
    }
}

impl Endianness {
    /// Native endian.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::LITTLE;
    /// Native endian.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::BIG;
}

wire_enum! {
    /// The type of a message.
    #[repr(u8)]
    pub enum MessageType {
        /// Method call. This message type may prompt a reply.
        METHOD_CALL = 1,
        /// Method reply with returned data.
        METHOD_RETURN = 2,
        /// Error reply. If the first argument exists and is a string, it is
        /// an error message.
        ERROR = 3,
        /// Signal emission.
        SIGNAL = 4,
    }
}

wire_flags! {
    /// Flags inside of a D-Bus message.
    #[repr(u8)]
    pub enum Flags {
        /// An empty set of flags.
        EMPTY = 0,
        /// This message does not expect method return replies or error
        /// replies, even if it is of a type that can have a reply; the reply
        /// should be omitted.
        NO_REPLY_EXPECTED = 1,
        /// The bus must not launch an owner for the destination name in
        /// response to this message.
        NO_AUTO_START = 2,
        /// The caller is prepared to wait for interactive authorization,
        /// which might take a considerable time to complete. Only valid for
        /// method call messages.
        ALLOW_INTERACTIVE_AUTHORIZATION = 4,
    }
}

wire_enum! {
    /// A field in the header field array of a message.
    #[repr(u8)]
    pub enum HeaderField {
        /// The object to send a call to, or the object a signal is emitted
        /// from. Required for method calls and signals.
        PATH = 1,
        /// The interface to invoke a method call on, or that a signal is
        /// emitted from. Optional for method calls, required for signals.
        INTERFACE = 2,
        /// The member, either the method name or signal name.
        MEMBER = 3,
        /// The name of the error that occurred, for errors.
        ERROR_NAME = 4,
        /// The serial number of the message this message is a reply to.
        REPLY_SERIAL = 5,
        /// The name of the connection this message is intended for.
        DESTINATION = 6,
        /// Unique name of the sending connection. On a message bus this
        /// field is controlled by the bus itself.
        SENDER = 7,
        /// The signature of the message body. If omitted, the body must be
        /// zero-length.
        SIGNATURE = 8,
        /// The number of unix file descriptors that accompany the message.
        UNIX_FDS = 9,
    }
}

wire_enum! {
    /// A type code inside of a signature.
    #[repr(u8)]
    pub enum Type {
        /// Not a valid type code, used to terminate signatures.
        INVALID = b'\0',
        /// 8-bit unsigned integer.
        BYTE = b'y',
        /// Boolean value, 0 is FALSE and 1 is TRUE. Everything else is
        /// invalid.
        BOOLEAN = b'b',
        /// 16-bit signed integer.
        INT16 = b'n',
        /// 16-bit unsigned integer.
        UINT16 = b'q',
        /// 32-bit signed integer.
        INT32 = b'i',
        /// 32-bit unsigned integer.
        UINT32 = b'u',
        /// 64-bit signed integer.
        INT64 = b'x',
        /// 64-bit unsigned integer.
        UINT64 = b't',
        /// IEEE 754 double.
        DOUBLE = b'd',
        /// UTF-8 string. Must be nul terminated on the wire and contain no
        /// other nul bytes.
        STRING = b's',
        /// Name of an object instance.
        OBJECT_PATH = b'o',
        /// A type signature.
        SIGNATURE = b'g',
        /// Array.
        ARRAY = b'a',
        /// Struct; reserved for use in bindings, must not appear in
        /// signatures used on the bus.
        STRUCT = b'r',
        OPEN_PAREN = b'(',
        CLOSE_PAREN = b')',
        /// Variant type; the type of the value is part of the value itself.
        VARIANT = b'v',
        /// Entry in a dict or map; reserved for use in bindings, must not
        /// appear in signatures used on the bus.
        DICT_ENTRY = b'e',
        OPEN_BRACE = b'{',
        CLOSE_BRACE = b'}',
        /// Unix file descriptor.
        UNIX_FD = b'h',
        /// Reserved for a 'maybe' type compatible with GVariant.
        RESERVED0 = b'm',
        /// Reserved to represent any single complete type in bindings.
        RESERVED1 = b'*',
        /// Reserved to represent any basic type in bindings.
        RESERVED2 = b'?',
        /// Reserved for internal use by bindings.
        RESERVED3 = b'@',
        RESERVED4 = b'&',
        RESERVED5 = b'^',
    }
}

impl Type {
    /// Test if the type code is a basic (fixed or string-like) type, i.e.
    /// one permitted as a dict entry key.
    pub const fn is_basic(self) -> bool {
        matches!(
            self.0,
            b'y' | b'b'
                | b'n'
                | b'q'
                | b'i'
                | b'u'
                | b'x'
                | b't'
                | b'd'
                | b's'
                | b'o'
                | b'g'
                | b'h'
        )
    }

    /// The wire alignment of a value of this type.
    ///
    /// Container codes report the alignment of their framing: arrays align
    /// to their length word, structs and dict entries to 8, variants to
    /// their leading signature byte.
    pub const fn alignment(self) -> usize {
        match self.0 {
            b'y' | b'g' | b'v' => 1,
            b'n' | b'q' => 2,
            b'b' | b'i' | b'u' | b'h' | b'a' | b's' | b'o' => 4,
            b'x' | b't' | b'd' | b'(' | b'{' => 8,
            _ => 1,
        }
    }
}
