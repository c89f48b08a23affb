use std::num::NonZeroU32;

use crate::{Message, MessageKind, ObjectPath, Serial};

use super::{decode_message, encode_message, RawHeader, HEADER_SIZE};

const PATH: &ObjectPath = ObjectPath::new_const(b"/org/example/Concierge");

fn serial(n: u32) -> Serial {
    Serial::new(NonZeroU32::new(n).unwrap())
}

#[test]
fn method_call_round_trip() -> crate::Result<()> {
    let mut m = Message::method_call(PATH, "CheckIn")
        .with_interface("org.example.Concierge")
        .with_destination("org.example");

    m.append_all(&("suite".to_string(), 443u32))?;
    m.seal()?;
    m.set_serial(serial(42));

    let bytes = encode_message(&m)?;

    let header = RawHeader::parse(&bytes)?;
    assert_eq!(header.serial, 42);
    assert_eq!(header.total_len(), bytes.len());
    assert!(bytes.len() > HEADER_SIZE);

    let mut decoded = decode_message(&bytes)?;

    assert!(matches!(
        decoded.kind(),
        MessageKind::MethodCall { path, member } if path == PATH && &**member == "CheckIn"
    ));
    assert_eq!(decoded.interface(), Some("org.example.Concierge"));
    assert_eq!(decoded.destination(), Some("org.example"));
    assert_eq!(decoded.signature(), "su");
    assert_eq!(
        decoded.read_all::<(String, u32)>()?,
        (String::from("suite"), 443)
    );
    Ok(())
}

#[test]
fn error_reply_round_trip() -> crate::Result<()> {
    let mut call = Message::method_call(PATH, "CheckIn").with_destination("org.example");
    call.seal()?;
    call.set_serial(serial(7));
    call.set_sender(Some(":1.101"));

    let error = crate::Error::new("org.example.Error.NoVacancy", "try next door");
    let mut reply = call.create_error_reply(&error)?;
    reply.seal()?;
    reply.set_serial(serial(8));

    let bytes = encode_message(&reply)?;
    let mut decoded = decode_message(&bytes)?;

    assert_eq!(decoded.error_name(), Some("org.example.Error.NoVacancy"));
    assert_eq!(decoded.reply_serial(), Some(serial(7)));
    assert_eq!(decoded.destination(), Some(":1.101"));
    assert_eq!(decoded.read::<String>()?, "try next door");
    Ok(())
}

#[test]
fn signal_round_trip() -> crate::Result<()> {
    let mut m = Message::signal(PATH, "org.example.Concierge", "DoorOpened");
    m.append(&true)?;
    m.seal()?;
    m.set_serial(serial(9));

    let bytes = encode_message(&m)?;
    let mut decoded = decode_message(&bytes)?;

    assert!(matches!(
        decoded.kind(),
        MessageKind::Signal { path, member } if path == PATH && &**member == "DoorOpened"
    ));
    assert!(decoded.read::<bool>()?);
    Ok(())
}

#[test]
fn unsealed_or_unserialed_messages_do_not_encode() -> crate::Result<()> {
    let mut m = Message::method_call(PATH, "CheckIn");
    m.seal()?;
    // No serial has been assigned.
    assert!(encode_message(&m).is_err());
    Ok(())
}
