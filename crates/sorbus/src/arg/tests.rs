use std::collections::HashMap;

use crate::{signature_of, Message, ObjectPathBuf, SignatureBuf, Variant};

fn round_trip<T>(value: T) -> crate::Result<T>
where
    T: crate::Arg,
{
    let mut m = Message::plain();
    m.append(&value)?;
    m.seal()?;
    m.read::<T>()
}

#[test]
fn scalar_round_trips() -> crate::Result<()> {
    assert_eq!(round_trip(true)?, true);
    assert_eq!(round_trip(false)?, false);
    assert_eq!(round_trip(0xa5u8)?, 0xa5);
    assert_eq!(round_trip(-1234i16)?, -1234);
    assert_eq!(round_trip(54321u16)?, 54321);
    assert_eq!(round_trip(-7_000_000i32)?, -7_000_000);
    assert_eq!(round_trip(3_000_000_000u32)?, 3_000_000_000);
    assert_eq!(round_trip(i64::MIN)?, i64::MIN);
    assert_eq!(round_trip(u64::MAX)?, u64::MAX);
    assert_eq!(round_trip(2.5f64)?, 2.5);
    assert_eq!(round_trip(String::from("hello"))?, "hello");
    assert_eq!(
        round_trip(ObjectPathBuf::new("/org/example")?)?,
        "/org/example"
    );
    assert_eq!(round_trip(SignatureBuf::new(b"a{sv}")?)?, "a{sv}");
    Ok(())
}

#[test]
fn signatures_of_supported_types() -> crate::Result<()> {
    assert_eq!(signature_of::<bool>()?, "b");
    assert_eq!(signature_of::<u8>()?, "y");
    assert_eq!(signature_of::<i16>()?, "n");
    assert_eq!(signature_of::<u16>()?, "q");
    assert_eq!(signature_of::<i32>()?, "i");
    assert_eq!(signature_of::<u32>()?, "u");
    assert_eq!(signature_of::<i64>()?, "x");
    assert_eq!(signature_of::<u64>()?, "t");
    assert_eq!(signature_of::<f64>()?, "d");
    assert_eq!(signature_of::<String>()?, "s");
    assert_eq!(signature_of::<ObjectPathBuf>()?, "o");
    assert_eq!(signature_of::<SignatureBuf>()?, "g");
    assert_eq!(signature_of::<crate::UnixFd>()?, "h");
    assert_eq!(signature_of::<Variant>()?, "v");
    assert_eq!(signature_of::<Vec<Vec<u8>>>()?, "aay");
    assert_eq!(signature_of::<[u64; 4]>()?, "at");
    assert_eq!(signature_of::<HashMap<u8, Vec<String>>>()?, "a{yas}");
    assert_eq!(signature_of::<(u8, (i32, String))>()?, "(y(is))");
    Ok(())
}

#[test]
fn container_round_trips() -> crate::Result<()> {
    assert_eq!(round_trip(vec![1u32, 2, 3])?, [1, 2, 3]);
    assert_eq!(round_trip(Vec::<String>::new())?, Vec::<String>::new());
    assert_eq!(round_trip([7i64, 8, 9])?, [7, 8, 9]);

    let mut map = HashMap::new();
    map.insert("one".to_string(), 1u32);
    map.insert("two".to_string(), 2u32);
    assert_eq!(round_trip(map.clone())?, map);

    let nested = vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]];
    assert_eq!(round_trip(nested.clone())?, nested);

    let record = (5u8, "mixed".to_string(), vec![1.5f64, -2.5]);
    assert_eq!(round_trip(record.clone())?, record);
    Ok(())
}

#[test]
fn fixed_length_arrays_verify_their_length() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&vec![1u32, 2, 3])?;
    m.seal()?;

    let error = m.read::<[u32; 4]>().unwrap_err();
    assert_eq!(error.error_name(), crate::error::name::INVALID_ARGS);
    Ok(())
}

#[test]
fn variant_round_trips() -> crate::Result<()> {
    let v = Variant::new(&123u32)?;
    assert_eq!(v.signature(), "u");
    assert_eq!(v.get::<u32>()?, 123);

    // Wrong type extraction fails and the variant stays readable.
    assert!(v.get::<String>().is_err());
    assert_eq!(v.get::<u32>()?, 123);

    let carried = round_trip(v)?;
    assert_eq!(carried.get::<u32>()?, 123);

    let nested = Variant::new(&Variant::new(&"deep".to_string())?)?;
    assert_eq!(nested.signature(), "v");
    let inner = round_trip(nested)?.get::<Variant>()?;
    assert_eq!(inner.get::<String>()?, "deep");

    let complex = Variant::new(&vec![(1u8, "x".to_string())])?;
    assert_eq!(complex.signature(), "a(ys)");
    assert_eq!(round_trip(complex)?.get::<Vec<(u8, String)>>()?, vec![(1, "x".to_string())]);
    Ok(())
}

#[test]
fn empty_variants_do_not_serialize() {
    let v = Variant::empty();
    assert!(v.is_empty());

    let mut m = Message::plain();
    assert!(m.append(&v).is_err());
}

#[test]
fn booleans_validate_their_wire_value() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append(&7u32)?;
    m.seal()?;

    // The cursor sees a `u` element, not a `b`.
    assert!(m.read::<bool>().is_err());
    Ok(())
}

#[test]
fn unix_fd_round_trips_in_process() -> crate::Result<()> {
    use std::os::fd::{AsRawFd, OwnedFd};

    let (a, _b) = std::os::unix::net::UnixStream::pair()?;
    let raw = a.as_raw_fd();
    let fd = crate::UnixFd::new(OwnedFd::from(a));

    let mut m = Message::plain();
    m.append(&fd)?;
    m.seal()?;

    let back = m.read::<crate::UnixFd>()?;
    assert_eq!(back.as_raw_fd(), raw);
    Ok(())
}

#[test]
fn argument_lists_are_flat() -> crate::Result<()> {
    let mut m = Message::plain();
    m.append_all(&(1u8, "two".to_string(), 3.0f64))?;
    m.seal()?;

    assert_eq!(m.signature(), "ysd");

    let (a, b, c) = m.read_all::<(u8, String, f64)>()?;
    assert_eq!((a, b.as_str(), c), (1, "two", 3.0));
    Ok(())
}
