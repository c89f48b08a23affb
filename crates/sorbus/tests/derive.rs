use std::collections::HashMap;

use sorbus::{signature_of, Arg, ContainerKind, Message, Signature, Variant};

#[derive(Arg, Debug, Clone, PartialEq)]
struct Station {
    name: String,
    frequency: f64,
    presets: Vec<u32>,
}

#[derive(Arg, Debug, Clone, PartialEq, Default)]
#[arg(dictionary)]
struct Profile {
    nickname: String,
    volume: u32,
}

#[derive(Arg, Debug, Clone, PartialEq, Default)]
#[arg(dictionary, relaxed)]
struct RelaxedProfile {
    nickname: String,
    volume: u32,
}

#[derive(Arg, Debug, Clone, PartialEq, Default)]
#[arg(dictionary)]
struct Rig {
    label: String,
    profile: Profile,
}

#[derive(Arg, Debug, Clone, Copy, PartialEq)]
#[repr(u32)]
enum Band {
    Am = 1,
    Fm = 2,
    Dab = 5,
}

#[derive(Arg, Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
enum Tiny {
    Off = 0,
    On = 1,
}

#[test]
fn derived_struct_uses_the_tuple_signature() -> sorbus::Result<()> {
    assert_eq!(signature_of::<Station>()?, "(sdau)");

    let station = Station {
        name: "P4".to_string(),
        frequency: 103.3,
        presets: vec![1, 4],
    };

    let mut m = Message::plain();
    m.append(&station)?;
    m.seal()?;

    assert_eq!(m.signature(), "(sdau)");
    assert_eq!(m.read::<Station>()?, station);
    Ok(())
}

#[test]
fn derived_enum_maps_to_its_repr() -> sorbus::Result<()> {
    assert_eq!(signature_of::<Band>()?, "u");
    assert_eq!(signature_of::<Tiny>()?, "y");

    let mut m = Message::plain();
    m.append(&Band::Dab)?;
    m.append(&Tiny::On)?;
    m.seal()?;

    assert_eq!(m.signature(), "uy");
    assert_eq!(m.read::<Band>()?, Band::Dab);
    assert_eq!(m.read::<Tiny>()?, Tiny::On);

    // Unknown discriminants fail the read.
    let mut m = Message::plain();
    m.append(&3u32)?;
    m.seal()?;
    assert!(m.read::<Band>().is_err());
    Ok(())
}

#[test]
fn dictionary_mode_serializes_as_a_string_variant_map() -> sorbus::Result<()> {
    assert_eq!(signature_of::<Profile>()?, "a{sv}");

    let profile = Profile {
        nickname: "kitchen".to_string(),
        volume: 11,
    };

    let mut m = Message::plain();
    m.append(&profile)?;
    m.seal()?;

    assert_eq!(m.signature(), "a{sv}");

    // The wire shape really is a plain string-to-variant map.
    let map = m.read::<HashMap<String, Variant>>()?;
    assert_eq!(map["nickname"].get::<String>()?, "kitchen");
    assert_eq!(map["volume"].get::<u32>()?, 11);

    m.rewind(true)?;
    assert_eq!(m.read::<Profile>()?, profile);
    Ok(())
}

#[test]
fn strict_dictionaries_require_every_key() -> sorbus::Result<()> {
    let mut m = Message::plain();
    m.open_container(ContainerKind::Array, Signature::new(b"{sv}")?)?;
    m.open_container(ContainerKind::DictEntry, Signature::new(b"sv")?)?;
    m.append(&"volume".to_string())?;
    m.append(&Variant::new(&3u32)?)?;
    m.close_container()?;
    m.close_container()?;
    m.seal()?;

    // `nickname` is missing.
    assert!(m.read::<Profile>().is_err());

    m.rewind(true)?;
    let relaxed = m.read::<RelaxedProfile>()?;
    assert_eq!(relaxed.volume, 3);
    assert_eq!(relaxed.nickname, "");
    Ok(())
}

#[test]
fn nested_dictionary_records_nest_as_dictionaries() -> sorbus::Result<()> {
    assert_eq!(signature_of::<Rig>()?, "a{sv}");

    let rig = Rig {
        label: "attic".to_string(),
        profile: Profile {
            nickname: "late night".to_string(),
            volume: 2,
        },
    };

    let mut m = Message::plain();
    m.append(&rig)?;
    m.seal()?;

    // The nested record is itself carried as an `a{sv}` value.
    let map = m.read::<HashMap<String, Variant>>()?;
    assert_eq!(map["profile"].signature(), "a{sv}");
    assert_eq!(map["profile"].get::<Profile>()?, rig.profile);

    m.rewind(true)?;
    assert_eq!(m.read::<Rig>()?, rig);
    Ok(())
}
