//! The D-Bus error value and the well-known error names.

use std::error;
use std::fmt;
use std::io;

use crate::{ObjectPathError, SignatureError};

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Well-known D-Bus error names.
pub mod name {
    /// The generic catch-all failure.
    pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
    /// The method does not exist on the interface.
    pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
    /// The object does not carry the interface.
    pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
    /// No object exists at the path.
    pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
    /// The interface carries no such property.
    pub const UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
    /// The property cannot be changed.
    pub const PROPERTY_READ_ONLY: &str = "org.freedesktop.DBus.Error.PropertyReadOnly";
    /// The arguments passed do not match the expected signature.
    pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
    /// The caller is not privileged enough.
    pub const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
    /// The peer disconnected or disappeared before replying.
    pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
    /// A method call did not complete within its deadline.
    pub const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";
    /// The requested operation is not supported.
    pub const NOT_SUPPORTED: &str = "org.freedesktop.DBus.Error.NotSupported";
    /// There is no service owning the destination name.
    pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
    /// The name is claimed by another connection.
    pub const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
    /// An I/O failure on the bus transport.
    pub const IO_ERROR: &str = "org.freedesktop.DBus.Error.IOError";
    /// The connection was disconnected.
    pub const DISCONNECTED: &str = "org.freedesktop.DBus.Error.Disconnected";
    /// An operation was attempted against a message in the wrong state.
    pub const INCONSISTENT_MESSAGE: &str = "org.freedesktop.DBus.Error.InconsistentMessage";
}

/// An error value as it travels over D-Bus: a dotted error name paired with a
/// human-readable message.
///
/// Errors raised inside method handlers are serialized into error replies
/// carrying exactly these two strings, and error replies deserialize back
/// into this type on the calling side.
///
/// # Examples
///
/// ```
/// use sorbus::Error;
///
/// let error = Error::new("org.example.Error.Wobbly", "too wobbly to comply");
/// assert_eq!(error.error_name(), "org.example.Error.Wobbly");
/// assert_eq!(error.message(), "too wobbly to comply");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    name: Box<str>,
    message: Box<str>,
    errno: Option<i32>,
}

impl Error {
    /// Construct a new error from a D-Bus error name and a message.
    pub fn new<N, M>(name: N, message: M) -> Self
    where
        N: AsRef<str>,
        M: AsRef<str>,
    {
        Self {
            name: name.as_ref().into(),
            message: message.as_ref().into(),
            errno: None,
        }
    }

    /// Construct an error from an OS errno value, carrying the errno for
    /// diagnostics.
    ///
    /// The error name is the canonical mapping of the errno where one exists
    /// and a `System.Error.*` name otherwise, mirroring what the reference
    /// bus implementations produce.
    pub fn from_errno(errno: i32, context: &str) -> Self {
        let name = match errno {
            libc::ENOMEM => "org.freedesktop.DBus.Error.NoMemory",
            libc::EPERM | libc::EACCES => name::ACCESS_DENIED,
            libc::ETIMEDOUT => name::TIMEOUT,
            libc::ENOTSUP => name::NOT_SUPPORTED,
            libc::EINVAL => name::INVALID_ARGS,
            libc::ENXIO | libc::ENOENT => name::UNKNOWN_OBJECT,
            libc::ECONNRESET | libc::EPIPE => name::DISCONNECTED,
            _ => name::FAILED,
        };

        let text = io::Error::from_raw_os_error(errno);

        Self {
            name: name.into(),
            message: format!("{context}: {text}").into(),
            errno: Some(errno),
        }
    }

    /// The generic `org.freedesktop.DBus.Error.Failed` error with the given
    /// message.
    pub fn failed<M>(message: M) -> Self
    where
        M: AsRef<str>,
    {
        Self::new(name::FAILED, message)
    }

    /// The D-Bus error name, e.g. `org.freedesktop.DBus.Error.UnknownMethod`.
    pub fn error_name(&self) -> &str {
        &self.name
    }

    /// The human-readable message carried next to the name.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The originating OS errno, if the error was produced from one.
    pub fn errno(&self) -> Option<i32> {
        self.errno
    }

    /// Test if this error is the canonical method call timeout.
    pub fn is_timeout(&self) -> bool {
        &*self.name == name::TIMEOUT || self.errno == Some(libc::ETIMEDOUT)
    }

    /// Test if this error names the given D-Bus error.
    pub fn is(&self, name: &str) -> bool {
        &*self.name == name
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl error::Error for Error {}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(name::INVALID_ARGS, error.to_string())
    }
}

impl From<ObjectPathError> for Error {
    #[inline]
    fn from(error: ObjectPathError) -> Self {
        Self::new(name::INVALID_ARGS, error.to_string())
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        let mut this = Self::new(name::IO_ERROR, error.to_string());
        this.errno = error.raw_os_error();
        this
    }
}

#[cfg(test)]
mod tests {
    use super::{name, Error};

    #[test]
    fn errno_mapping() {
        let error = Error::from_errno(libc::EACCES, "setting property");
        assert_eq!(error.error_name(), name::ACCESS_DENIED);
        assert_eq!(error.errno(), Some(libc::EACCES));
        assert!(error.message().starts_with("setting property: "));
    }

    #[test]
    fn timeout_detection() {
        assert!(Error::new(name::TIMEOUT, "").is_timeout());
        assert!(Error::from_errno(libc::ETIMEDOUT, "call").is_timeout());
        assert!(!Error::failed("nope").is_timeout());
    }
}
