use super::signature_error::SignatureErrorKind::{self, *};
use super::{Signature, SignatureBuf, Type, MAX_SIGNATURE_LEN};

fn check(input: &[u8]) -> Result<(), (SignatureErrorKind, usize)> {
    match Signature::new(input) {
        Ok(_) => Ok(()),
        Err(error) => Err((error.kind, error.at)),
    }
}

#[test]
fn accepts_valid_signatures() {
    let valid: &[&[u8]] = &[
        b"",
        b"i",
        b"v",
        b"sss",
        b"ai",
        b"aai",
        b"(i)",
        b"(ii)(ss)",
        b"a{sv}",
        b"aa{sv}",
        b"a{s(iu)}",
        b"a{sa{sv}}",
        b"(a{sv}xh)",
        b"ya(d)go",
    ];

    for input in valid {
        assert!(
            check(input).is_ok(),
            "{:?} should validate",
            String::from_utf8_lossy(input)
        );
    }

    // The protocol caps signatures at 255 bytes, exactly.
    assert!(check(&[b'i'; MAX_SIGNATURE_LEN]).is_ok());
    assert_eq!(
        check(&[b'i'; MAX_SIGNATURE_LEN + 1]),
        Err((TooLong, 0))
    );
}

#[test]
fn rejects_unknown_type_codes() {
    assert_eq!(check(b"w"), Err((UnknownType(b'w'), 0)));
    assert_eq!(check(b"iw"), Err((UnknownType(b'w'), 1)));
    assert_eq!(check(b"a{s*}"), Err((UnknownType(b'*'), 3)));
    assert_eq!(check(b" "), Err((UnknownType(b' '), 0)));
    assert_eq!(check(b"123"), Err((UnknownType(b'1'), 0)));
}

#[test]
fn rejects_arrays_without_an_element() {
    assert_eq!(check(b"a"), Err((TrailingArray, 0)));
    assert_eq!(check(b"ia"), Err((TrailingArray, 1)));
    assert_eq!(check(b"aaa"), Err((TrailingArray, 2)));
    assert_eq!(check(b"ii(ii)a"), Err((TrailingArray, 6)));
    assert_eq!(check(b"(a)"), Err((TrailingArray, 1)));
    assert_eq!(check(b"a{ia}"), Err((TrailingArray, 3)));
}

#[test]
fn rejects_unbalanced_delimiters() {
    assert_eq!(check(b")"), Err((UnmatchedDelimiter, 0)));
    assert_eq!(check(b"}"), Err((UnmatchedDelimiter, 0)));
    assert_eq!(check(b"i)"), Err((UnmatchedDelimiter, 1)));
    assert_eq!(check(b"("), Err((UnmatchedDelimiter, 0)));
    assert_eq!(check(b"(i"), Err((UnmatchedDelimiter, 0)));
    assert_eq!(check(b"(iiiii"), Err((UnmatchedDelimiter, 0)));
    assert_eq!(check(b"((i)"), Err((UnmatchedDelimiter, 0)));
}

#[test]
fn rejects_empty_structs() {
    assert_eq!(check(b"()"), Err((EmptyStruct, 0)));
    assert_eq!(check(b"(())"), Err((EmptyStruct, 1)));
    assert_eq!(check(b"a()"), Err((EmptyStruct, 1)));
    assert_eq!(check(b"i()"), Err((EmptyStruct, 1)));
    assert_eq!(check(b"()i"), Err((EmptyStruct, 0)));
}

#[test]
fn rejects_malformed_dict_entries() {
    // A dict entry can only be the element of an array.
    assert_eq!(check(b"{is}"), Err((StrayDictEntry, 0)));
    assert_eq!(check(b"({is})"), Err((StrayDictEntry, 1)));

    // Exactly one key and one value.
    assert_eq!(check(b"a{}"), Err((DictEntryArity, 1)));
    assert_eq!(check(b"a{i}"), Err((DictEntryArity, 1)));
    assert_eq!(check(b"a{isi}"), Err((DictEntryArity, 4)));

    // Keys are basic types; containers and variants cannot key an entry.
    // https://bugs.freedesktop.org/show_bug.cgi?id=17803
    assert_eq!(check(b"a{(ii)i}"), Err((NonBasicDictKey, 2)));
    assert_eq!(check(b"a{aii}"), Err((NonBasicDictKey, 2)));
    assert_eq!(check(b"a{vs}"), Err((NonBasicDictKey, 2)));
}

#[test]
fn enforces_nesting_budgets() {
    // 32 nested arrays are the protocol maximum.
    let mut deep = vec![b'a'; 32];
    deep.push(b'i');
    assert!(check(&deep).is_ok());

    let mut too_deep = vec![b'a'; 33];
    too_deep.push(b'i');
    assert_eq!(check(&too_deep), Err((NestingTooDeep, 32)));

    // Likewise 32 nested structs.
    let mut deep = Vec::new();
    deep.extend(std::iter::repeat(b'(').take(32));
    deep.extend_from_slice(b"ii");
    deep.extend(std::iter::repeat(b')').take(32));
    assert!(check(&deep).is_ok());

    let mut too_deep = Vec::new();
    too_deep.extend(std::iter::repeat(b'(').take(33));
    too_deep.extend_from_slice(b"ii");
    too_deep.extend(std::iter::repeat(b')').take(33));
    assert_eq!(check(&too_deep), Err((NestingTooDeep, 32)));
}

#[test]
fn iteration_classifies_complete_types() {
    let sig = Signature::new("aaa(as)yua{yy}v").unwrap();
    let mut it = sig.iter();

    let Some(Type::Array(elems)) = it.next() else {
        panic!("expected array");
    };
    assert_eq!(elems, "aa(as)");

    let Some(Type::Array(elems)) = elems.iter().next() else {
        panic!("expected nested array");
    };
    assert_eq!(elems, "a(as)");

    let Some(Type::Array(elems)) = elems.iter().next() else {
        panic!("expected innermost array");
    };

    let Some(Type::Struct(fields)) = elems.iter().next() else {
        panic!("expected struct element");
    };
    assert_eq!(fields, "as");

    assert_eq!(it.next(), Some(Type::Basic(Signature::BYTE)));
    assert_eq!(it.next(), Some(Type::Basic(Signature::UINT32)));

    let Some(Type::Array(entries)) = it.next() else {
        panic!("expected dict array");
    };

    let Some(Type::Dict(key, value)) = entries.iter().next() else {
        panic!("expected dict entry");
    };
    assert_eq!(key, Signature::BYTE);
    assert_eq!(value, Signature::BYTE);

    assert_eq!(it.next(), Some(Type::Basic(Signature::VARIANT)));
    assert_eq!(it.next(), None);
}

#[test]
fn split_first_walks_complete_types() {
    let sig = Signature::new("a{s(iu)}bv").unwrap();

    let (head, tail) = sig.split_first().unwrap();
    assert_eq!(head, "a{s(iu)}");
    assert_eq!(tail, "bv");

    let (head, tail) = tail.split_first().unwrap();
    assert_eq!(head, "b");
    assert_eq!(tail, "v");

    let (head, tail) = tail.split_first().unwrap();
    assert_eq!(head, "v");
    assert!(tail.is_empty());
    assert!(tail.split_first().is_none());

    assert!(head.is_single_complete_type());
    assert!(!sig.is_single_complete_type());
    assert!(!Signature::EMPTY.is_single_complete_type());
}

#[test]
fn owned_signatures_round_trip() {
    let owned = SignatureBuf::new(b"a{sv}").unwrap();
    assert_eq!(owned, "a{sv}");
    assert_eq!(owned.clone(), owned);

    let borrowed: &Signature = &owned;
    assert_eq!(borrowed.to_owned(), owned);

    assert!(SignatureBuf::new(b"a{").is_err());
}

#[test]
fn errors_render_their_offsets() {
    let error = Signature::new(b"ii(ii)a").unwrap_err();
    assert_eq!(error.offset(), 6);
    assert!(error.to_string().contains("offset 6"));
}
