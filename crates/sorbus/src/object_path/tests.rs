use super::{ObjectPath, ObjectPathError};

#[test]
fn validation() {
    assert!(ObjectPath::new("/").is_ok());
    assert!(ObjectPath::new("/a").is_ok());
    assert!(ObjectPath::new("/org/freedesktop/DBus").is_ok());
    assert!(ObjectPath::new("/_/0").is_ok());

    assert_eq!(
        ObjectPath::new("").unwrap_err(),
        ObjectPathError::MissingLeadingSlash
    );
    assert_eq!(
        ObjectPath::new("relative/path").unwrap_err(),
        ObjectPathError::MissingLeadingSlash
    );
    assert_eq!(
        ObjectPath::new("/a/").unwrap_err(),
        ObjectPathError::TrailingSlash
    );
    assert_eq!(
        ObjectPath::new("/a//b").unwrap_err(),
        ObjectPathError::EmptyElement
    );
    assert_eq!(
        ObjectPath::new("/a-b").unwrap_err(),
        ObjectPathError::InvalidCharacter(b'-')
    );
}

#[test]
fn parents() {
    let path = ObjectPath::new("/org/example/child").unwrap();
    assert_eq!(path.parent().unwrap(), "/org/example");
    assert_eq!(path.parent().unwrap().parent().unwrap(), "/org");
    assert_eq!(path.parent().unwrap().parent().unwrap().parent().unwrap(), "/");
    assert!(ObjectPath::ROOT.parent().is_none());
}
