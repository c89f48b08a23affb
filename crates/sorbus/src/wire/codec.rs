use std::num::NonZeroU32;

use crate::error::{name, Error, Result};
use crate::proto::{Endianness, Flags, HeaderField, MessageType};
use crate::wire::{self, padding_to, WireBuf, MAX_ARRAY_LENGTH, MAX_BODY_LENGTH};
use crate::{Message, MessageKind, ObjectPathBuf, Serial, Signature, SignatureBuf};

/// The fixed-size part of a message header, including the length of the
/// header field array which immediately follows it.
pub(crate) struct RawHeader {
    pub(crate) endianness: Endianness,
    pub(crate) message_type: MessageType,
    pub(crate) flags: Flags,
    pub(crate) body_len: usize,
    pub(crate) serial: u32,
    pub(crate) fields_len: usize,
}

/// Size of the fixed header on the wire.
pub(crate) const HEADER_SIZE: usize = 16;

impl RawHeader {
    /// Parse the fixed header from the first [`HEADER_SIZE`] bytes of a
    /// message.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        debug_assert!(bytes.len() >= HEADER_SIZE);

        let endianness = Endianness::from_raw(bytes[0]);

        if !matches!(endianness, Endianness::LITTLE | Endianness::BIG) {
            return Err(protocol_error("invalid endianness marker"));
        }

        let message_type = MessageType::from_raw(bytes[1]);
        let flags = Flags::from_raw(bytes[2]);

        if bytes[3] != 1 {
            return Err(protocol_error("unsupported protocol version"));
        }

        let mut pos = 4;
        let body_len = wire::read_frame::<u32>(bytes, &mut pos, endianness)?;
        let serial = wire::read_frame::<u32>(bytes, &mut pos, endianness)?;
        let fields_len = wire::read_frame::<u32>(bytes, &mut pos, endianness)?;

        if body_len > MAX_BODY_LENGTH {
            return Err(protocol_error("message body is too long"));
        }

        if fields_len > MAX_ARRAY_LENGTH {
            return Err(protocol_error("message header is too long"));
        }

        Ok(Self {
            endianness,
            message_type,
            flags,
            body_len: body_len as usize,
            serial,
            fields_len: fields_len as usize,
        })
    }

    /// The total size of the message on the wire, header included.
    pub(crate) fn total_len(&self) -> usize {
        let fields_end = HEADER_SIZE + self.fields_len;
        fields_end + padding_to(8, fields_end) + self.body_len
    }
}

/// Serialize a message, which must have been assigned a serial, into its
/// full wire form.
pub(crate) fn encode_message(message: &Message) -> Result<Vec<u8>> {
    let serial = message
        .serial()
        .ok_or_else(|| protocol_error("message has not been assigned a serial"))?;

    if message.fd_count() > 0 {
        return Err(Error::new(
            name::NOT_SUPPORTED,
            "file descriptor passing is not supported by this transport",
        ));
    }

    let endianness = message.endianness();
    let message_type = match message.kind() {
        MessageKind::MethodCall { .. } => MessageType::METHOD_CALL,
        MessageKind::MethodReturn { .. } => MessageType::METHOD_RETURN,
        MessageKind::Error { .. } => MessageType::ERROR,
        MessageKind::Signal { .. } => MessageType::SIGNAL,
        MessageKind::Plain => {
            return Err(protocol_error("plain messages cannot travel on the bus"));
        }
    };

    let body = message.body_bytes();

    let Ok(body_len) = u32::try_from(body.len()) else {
        return Err(protocol_error("message body is too long"));
    };

    if body_len > MAX_BODY_LENGTH {
        return Err(protocol_error("message body is too long"));
    }

    let mut buf = WireBuf::new();
    buf.store_frame(endianness, endianness);
    buf.store_frame(message_type, endianness);
    buf.store_frame(message.flags(), endianness);
    buf.store_frame(1u8, endianness);
    buf.store_frame(body_len, endianness);
    buf.store_frame(serial.get(), endianness);

    let fields_len_slot = buf.alloc_u32();
    let fields_start = buf.len();

    match message.kind() {
        MessageKind::MethodCall { path, member } => {
            store_field_str(&mut buf, endianness, HeaderField::PATH, Signature::OBJECT_PATH, path.as_str());
            store_field_str(&mut buf, endianness, HeaderField::MEMBER, Signature::STRING, member);
        }
        MessageKind::MethodReturn { reply_serial } => {
            store_field_u32(&mut buf, endianness, HeaderField::REPLY_SERIAL, reply_serial.get());
        }
        MessageKind::Error {
            error_name,
            reply_serial,
        } => {
            store_field_str(&mut buf, endianness, HeaderField::ERROR_NAME, Signature::STRING, error_name);
            store_field_u32(&mut buf, endianness, HeaderField::REPLY_SERIAL, reply_serial.get());
        }
        MessageKind::Signal { path, member } => {
            store_field_str(&mut buf, endianness, HeaderField::PATH, Signature::OBJECT_PATH, path.as_str());
            store_field_str(&mut buf, endianness, HeaderField::MEMBER, Signature::STRING, member);
        }
        MessageKind::Plain => unreachable!(),
    }

    if let Some(interface) = message.interface() {
        store_field_str(&mut buf, endianness, HeaderField::INTERFACE, Signature::STRING, interface);
    }

    if let Some(destination) = message.destination() {
        store_field_str(&mut buf, endianness, HeaderField::DESTINATION, Signature::STRING, destination);
    }

    if let Some(sender) = message.sender() {
        store_field_str(&mut buf, endianness, HeaderField::SENDER, Signature::STRING, sender);
    }

    if !message.signature().is_empty() {
        buf.align_for(8);
        buf.store_frame(HeaderField::SIGNATURE, endianness);
        store_signature_value(&mut buf, endianness, Signature::SIGNATURE);
        store_signature_value(&mut buf, endianness, message.signature());
    }

    let Ok(fields_len) = u32::try_from(buf.len() - fields_start) else {
        return Err(protocol_error("message header is too long"));
    };

    buf.store_at(fields_len_slot, fields_len, endianness);

    buf.align_for(8);
    buf.extend_from_slice(body);

    let mut out = Vec::new();
    out.extend_from_slice(buf.get());
    Ok(out)
}

/// Parse a full wire frame back into a [`Message`].
pub(crate) fn decode_message(bytes: &[u8]) -> Result<Message> {
    if bytes.len() < HEADER_SIZE {
        return Err(protocol_error("message is truncated"));
    }

    let header = RawHeader::parse(bytes)?;
    let endianness = header.endianness;

    if bytes.len() < header.total_len() {
        return Err(protocol_error("message is truncated"));
    }

    let serial = NonZeroU32::new(header.serial)
        .map(Serial::new)
        .ok_or_else(|| protocol_error("message serial is zero"))?;

    let fields_end = HEADER_SIZE + header.fields_len;

    let mut path = None;
    let mut interface = None;
    let mut member = None;
    let mut error_name = None;
    let mut reply_serial = None;
    let mut destination = None;
    let mut sender = None;
    let mut signature = SignatureBuf::empty();

    let mut pos = HEADER_SIZE;

    while pos < fields_end {
        pos += padding_to(8, pos);

        if pos >= fields_end {
            break;
        }

        let field = wire::read_frame::<HeaderField>(bytes, &mut pos, endianness)?;
        let field_signature = read_signature_value(bytes, &mut pos, endianness)?;

        match (field, field_signature.as_bytes()) {
            (HeaderField::PATH, b"o") => {
                let value = read_string_value(bytes, &mut pos, endianness)?;
                path = Some(ObjectPathBuf::new(value)?);
            }
            (HeaderField::INTERFACE, b"s") => {
                interface = Some(Box::<str>::from(read_string_value(bytes, &mut pos, endianness)?));
            }
            (HeaderField::MEMBER, b"s") => {
                member = Some(Box::<str>::from(read_string_value(bytes, &mut pos, endianness)?));
            }
            (HeaderField::ERROR_NAME, b"s") => {
                error_name = Some(Box::<str>::from(read_string_value(bytes, &mut pos, endianness)?));
            }
            (HeaderField::REPLY_SERIAL, b"u") => {
                let number = wire::read_frame::<u32>(bytes, &mut pos, endianness)?;
                let number = NonZeroU32::new(number)
                    .ok_or_else(|| protocol_error("reply serial is zero"))?;
                reply_serial = Some(Serial::new(number));
            }
            (HeaderField::DESTINATION, b"s") => {
                destination = Some(Box::<str>::from(read_string_value(bytes, &mut pos, endianness)?));
            }
            (HeaderField::SENDER, b"s") => {
                sender = Some(Box::<str>::from(read_string_value(bytes, &mut pos, endianness)?));
            }
            (HeaderField::SIGNATURE, b"g") => {
                signature = read_signature_value(bytes, &mut pos, endianness)?;
            }
            (_, _) => {
                skip_value(bytes, &mut pos, endianness, &field_signature)?;
            }
        }
    }

    let kind = match header.message_type {
        MessageType::METHOD_CALL => {
            let path = path.ok_or_else(|| protocol_error("method call without a path"))?;
            let member = member.ok_or_else(|| protocol_error("method call without a member"))?;
            MessageKind::MethodCall { path, member }
        }
        MessageType::METHOD_RETURN => {
            let reply_serial =
                reply_serial.ok_or_else(|| protocol_error("reply without a reply serial"))?;
            MessageKind::MethodReturn { reply_serial }
        }
        MessageType::ERROR => {
            let error_name =
                error_name.ok_or_else(|| protocol_error("error without an error name"))?;
            let reply_serial =
                reply_serial.ok_or_else(|| protocol_error("error without a reply serial"))?;
            MessageKind::Error {
                error_name,
                reply_serial,
            }
        }
        MessageType::SIGNAL => {
            let path = path.ok_or_else(|| protocol_error("signal without a path"))?;
            let member = member.ok_or_else(|| protocol_error("signal without a member"))?;
            MessageKind::Signal { path, member }
        }
        _ => return Err(protocol_error("unknown message type")),
    };

    let body_start = fields_end + padding_to(8, fields_end);
    let body = bytes[body_start..body_start + header.body_len].to_vec();

    Ok(Message::from_wire_parts(
        kind,
        serial,
        header.flags,
        interface,
        destination,
        sender,
        endianness,
        signature,
        WireBuf::from_vec(body),
    ))
}

fn store_field_str(
    buf: &mut WireBuf,
    endianness: Endianness,
    field: HeaderField,
    signature: &Signature,
    value: &str,
) {
    buf.align_for(8);
    buf.store_frame(field, endianness);
    store_signature_value(buf, endianness, signature);
    buf.store_frame(value.len() as u32, endianness);
    buf.extend_from_slice_nul(value.as_bytes());
}

fn store_field_u32(buf: &mut WireBuf, endianness: Endianness, field: HeaderField, value: u32) {
    buf.align_for(8);
    buf.store_frame(field, endianness);
    store_signature_value(buf, endianness, Signature::UINT32);
    buf.store_frame(value, endianness);
}

fn store_signature_value(buf: &mut WireBuf, endianness: Endianness, signature: &Signature) {
    buf.store_frame(signature.len() as u8, endianness);
    buf.extend_from_slice_nul(signature.as_bytes());
}

fn read_signature_value(
    bytes: &[u8],
    pos: &mut usize,
    endianness: Endianness,
) -> Result<SignatureBuf> {
    let len = wire::read_frame::<u8>(bytes, pos, endianness)? as usize;
    let slice = wire::read_slice_nul(bytes, pos, len)?;
    Ok(SignatureBuf::new(slice)?)
}

fn read_string_value<'a>(
    bytes: &'a [u8],
    pos: &mut usize,
    endianness: Endianness,
) -> Result<&'a str> {
    let len = wire::read_frame::<u32>(bytes, pos, endianness)? as usize;
    let slice = wire::read_slice_nul(bytes, pos, len)?;
    core::str::from_utf8(slice).map_err(|_| protocol_error("header string is not valid UTF-8"))
}

/// Skip one complete value of the given signature, used for unknown header
/// fields.
fn skip_value(
    bytes: &[u8],
    pos: &mut usize,
    endianness: Endianness,
    signature: &Signature,
) -> Result<()> {
    let sig = signature.as_bytes();

    match sig[0] {
        b'y' => {
            wire::read_frame::<u8>(bytes, pos, endianness)?;
        }
        b'n' | b'q' => {
            wire::read_frame::<u16>(bytes, pos, endianness)?;
        }
        b'b' | b'i' | b'u' | b'h' => {
            wire::read_frame::<u32>(bytes, pos, endianness)?;
        }
        b'x' | b't' | b'd' => {
            wire::read_frame::<u64>(bytes, pos, endianness)?;
        }
        b's' | b'o' => {
            read_string_value(bytes, pos, endianness)?;
        }
        b'g' => {
            read_signature_value(bytes, pos, endianness)?;
        }
        b'v' => {
            let inner = read_signature_value(bytes, pos, endianness)?;
            skip_value(bytes, pos, endianness, &inner)?;
        }
        b'a' => {
            let len = wire::read_frame::<u32>(bytes, pos, endianness)? as usize;
            let align = crate::proto::Type::from_raw(sig[1]).alignment();
            *pos += padding_to(align, *pos);
            wire::read_slice(bytes, pos, len)?;
        }
        b'(' | b'{' => {
            *pos += padding_to(8, *pos);
            // SAFETY: The contents of a valid struct or dict entry signature
            // are a valid signature on their own.
            let mut inner = unsafe { Signature::new_unchecked(&sig[1..sig.len() - 1]) };

            loop {
                let Some((head, tail)) = inner.split_first() else {
                    break;
                };

                skip_value(bytes, pos, endianness, head)?;
                inner = tail;
            }
        }
        _ => return Err(protocol_error("unknown type in header field")),
    }

    Ok(())
}

fn protocol_error(message: &str) -> Error {
    Error::new(name::INCONSISTENT_MESSAGE, message)
}
