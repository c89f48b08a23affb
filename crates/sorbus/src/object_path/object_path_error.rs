use std::error;
use std::fmt;

/// Errors raised when validating an [`ObjectPath`].
///
/// [`ObjectPath`]: super::ObjectPath
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectPathError {
    /// The path does not begin with `/`.
    MissingLeadingSlash,
    /// The path ends with `/` but is not the root path.
    TrailingSlash,
    /// The path contains an empty `//` element.
    EmptyElement,
    /// The path contains a character outside of `[A-Za-z0-9_/]`.
    InvalidCharacter(u8),
}

impl fmt::Display for ObjectPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ObjectPathError::MissingLeadingSlash => {
                write!(f, "Object path must begin with a slash")
            }
            ObjectPathError::TrailingSlash => {
                write!(f, "Object path must not end with a slash")
            }
            ObjectPathError::EmptyElement => {
                write!(f, "Object path must not contain empty elements")
            }
            ObjectPathError::InvalidCharacter(b) => {
                write!(f, "Invalid character `{}` in object path", b as char)
            }
        }
    }
}

impl error::Error for ObjectPathError {}
