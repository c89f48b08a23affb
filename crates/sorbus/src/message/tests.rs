use crate::proto;
use crate::{ContainerKind, Message, Signature};

#[test]
fn building_and_reading_states() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&1u32)?;

    // Not sealed yet, reading is not possible.
    assert!(m.read::<u32>().is_err());

    m.seal()?;
    assert!(m.is_sealed());

    // Sealed, writing is no longer possible.
    assert!(m.append(&2u32).is_err());

    assert_eq!(m.read::<u32>()?, 1);
    Ok(())
}

#[test]
fn read_mismatch_leaves_cursor_unchanged() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&10u32)?;
    m.append(&"follow-up".to_string())?;
    m.seal()?;

    let error = m.read::<String>().unwrap_err();
    assert_eq!(error.error_name(), crate::error::name::INVALID_ARGS);

    // The failed read consumed nothing.
    assert_eq!(m.read::<u32>()?, 10);
    assert_eq!(m.read::<String>()?, "follow-up");
    Ok(())
}

#[test]
fn rewind_restarts_reads() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&7u8)?;
    m.append(&8u8)?;
    m.seal()?;

    assert_eq!(m.read::<u8>()?, 7);
    assert_eq!(m.read::<u8>()?, 8);
    assert!(m.try_read::<u8>()?.is_none());
    assert!(!m.ok());

    m.rewind(true)?;
    assert!(m.ok());
    assert_eq!(m.read::<u8>()?, 7);
    Ok(())
}

#[test]
fn runtime_array_container() -> crate::Result<()> {
    let mut m = Message::plain();

    m.open_container(ContainerKind::Array, Signature::UINT32)?;
    m.append(&1u32)?;
    m.append(&2u32)?;
    m.append(&3u32)?;
    m.close_container()?;
    m.seal()?;

    assert_eq!(m.signature(), "au");

    m.enter_container(ContainerKind::Array, Signature::UINT32)?;

    let mut values = Vec::new();

    while let Some(value) = m.try_read::<u32>()? {
        values.push(value);
    }

    assert_eq!(values, [1, 2, 3]);
    assert!(!m.ok());

    m.exit_container()?;
    assert!(m.ok());
    Ok(())
}

#[test]
fn runtime_struct_and_dict_containers() -> crate::Result<()> {
    let mut m = Message::plain();

    m.open_container(ContainerKind::Array, Signature::new(b"{sv}")?)?;

    m.open_container(ContainerKind::DictEntry, Signature::new(b"sv")?)?;
    m.append(&"answer".to_string())?;
    m.open_container(ContainerKind::Variant, Signature::UINT32)?;
    m.append(&42u32)?;
    m.close_container()?;
    m.close_container()?;

    m.close_container()?;

    m.open_container(ContainerKind::Struct, Signature::new(b"is")?)?;
    m.append(&-5i32)?;
    m.append(&"negative".to_string())?;
    m.close_container()?;

    m.seal()?;
    assert_eq!(m.signature(), "a{sv}(is)");

    m.enter_container(ContainerKind::Array, Signature::new(b"{sv}")?)?;
    m.enter_container(ContainerKind::DictEntry, Signature::empty())?;
    assert_eq!(m.read::<String>()?, "answer");
    m.enter_container(ContainerKind::Variant, Signature::empty())?;
    assert_eq!(m.read::<u32>()?, 42);
    m.exit_container()?;
    m.exit_container()?;
    m.exit_container()?;

    m.enter_container(ContainerKind::Struct, Signature::new(b"is")?)?;
    assert_eq!(m.read::<i32>()?, -5);
    assert_eq!(m.read::<String>()?, "negative");
    m.exit_container()?;

    assert!(m.try_read::<u32>()?.is_none());
    Ok(())
}

#[test]
fn closing_a_container_verifies_contents() -> crate::Result<()> {
    let mut m = Message::plain();

    m.open_container(ContainerKind::Array, Signature::UINT32)?;
    m.append(&1u32)?;
    m.append(&2u16)?;

    assert!(m.close_container().is_err());
    Ok(())
}

#[test]
fn sealing_with_open_containers_fails() -> crate::Result<()> {
    let mut m = Message::plain();
    m.open_container(ContainerKind::Array, Signature::UINT32)?;
    assert!(m.seal().is_err());

    m.close_container()?;
    m.seal()?;
    Ok(())
}

#[test]
fn peek_type_reports_the_next_element() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&1u8)?;
    m.append(&vec![1u32, 2])?;
    m.append(&crate::Variant::new(&"inside".to_string())?)?;
    m.seal()?;

    let (t, contents) = m.peek_type()?.unwrap();
    assert_eq!(t, proto::Type::BYTE);
    assert!(contents.is_none());
    m.read::<u8>()?;

    let (t, contents) = m.peek_type()?.unwrap();
    assert_eq!(t, proto::Type::ARRAY);
    assert_eq!(contents.unwrap(), "u");
    m.read::<Vec<u32>>()?;

    let (t, contents) = m.peek_type()?.unwrap();
    assert_eq!(t, proto::Type::VARIANT);
    assert_eq!(contents.unwrap(), "s");
    m.read::<crate::Variant>()?;

    assert!(m.peek_type()?.is_none());
    Ok(())
}

#[test]
fn partial_rewind_restarts_the_innermost_container() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&vec![5u32, 6])?;
    m.seal()?;

    m.enter_container(ContainerKind::Array, Signature::UINT32)?;
    assert_eq!(m.read::<u32>()?, 5);
    assert_eq!(m.read::<u32>()?, 6);

    m.rewind(false)?;
    assert_eq!(m.read::<u32>()?, 5);

    m.exit_container()?;
    assert!(m.try_read::<u32>()?.is_none());
    Ok(())
}

#[test]
fn reply_construction_links_headers() -> crate::Result<()> {
    use std::num::NonZeroU32;

    let path = crate::ObjectPath::new("/org/example/widget")?;

    let mut call = Message::method_call(path, "Frobnicate").with_destination(":1.7");
    call.seal()?;

    // An unsent call has no serial to link a reply to.
    assert!(call.create_reply().is_err());

    call.set_serial(crate::Serial::new(NonZeroU32::new(77).unwrap()));
    call.set_sender(Some(":1.99"));

    let reply = call.create_reply()?;
    assert_eq!(reply.reply_serial().unwrap(), 77);
    assert_eq!(reply.destination(), Some(":1.99"));

    let error = crate::Error::new("org.example.Error.Broken", "gears jammed");
    let mut reply = call.create_error_reply(&error)?;
    reply.seal()?;
    assert_eq!(reply.error_name(), Some("org.example.Error.Broken"));
    assert_eq!(reply.read::<String>()?, "gears jammed");
    Ok(())
}

#[test]
fn copy_body_transfers_every_value() -> crate::Result<()> {
    let mut src = Message::plain();
    src.append(&3u16)?;
    src.append(&"carried".to_string())?;
    src.append(&vec![(1u8, 2i64)])?;
    src.seal()?;

    let mut dst = Message::plain();
    dst.append(&9u8)?;
    src.copy_body_to(&mut dst)?;
    dst.seal()?;

    assert_eq!(dst.signature(), "yqsa(yx)");
    assert_eq!(dst.read::<u8>()?, 9);
    assert_eq!(dst.read::<u16>()?, 3);
    assert_eq!(dst.read::<String>()?, "carried");
    assert_eq!(dst.read::<Vec<(u8, i64)>>()?, vec![(1, 2)]);
    Ok(())
}

#[test]
fn no_reply_flag_round_trips() -> crate::Result<()> {
    let path = crate::ObjectPath::new("/org/example/widget")?;
    let mut call = Message::method_call(path, "FireAndForget");

    assert!(!call.no_reply_expected());
    call.set_no_reply_expected(true);
    assert!(call.no_reply_expected());
    call.set_no_reply_expected(false);
    assert!(!call.no_reply_expected());
    Ok(())
}
