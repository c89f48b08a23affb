use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{ObjectPath, ObjectPathError};

/// An owned, validated D-Bus object path.
///
/// Dereferences to [`ObjectPath`].
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectPathBuf {
    data: Box<[u8]>,
}

impl ObjectPathBuf {
    /// Try to construct a new owned object path with validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::ObjectPathBuf;
    ///
    /// let path = ObjectPathBuf::new("/org/freedesktop/DBus")?;
    /// assert_eq!(path.as_str(), "/org/freedesktop/DBus");
    /// # Ok::<_, sorbus::ObjectPathError>(())
    /// ```
    pub fn new<P>(path: &P) -> Result<Self, ObjectPathError>
    where
        P: ?Sized + AsRef<[u8]>,
    {
        Ok(ObjectPath::new(path)?.to_owned())
    }
}

impl Deref for ObjectPathBuf {
    type Target = ObjectPath;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: Only constructed from validated paths.
        unsafe { ObjectPath::new_unchecked(&self.data) }
    }
}

impl Borrow<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn borrow(&self) -> &ObjectPath {
        self
    }
}

impl AsRef<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl From<&ObjectPath> for ObjectPathBuf {
    #[inline]
    fn from(path: &ObjectPath) -> Self {
        Self {
            data: path.as_bytes().into(),
        }
    }
}

impl fmt::Debug for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Display for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &ObjectPath) -> bool {
        *self.data == *other.as_bytes()
    }
}

impl PartialEq<&ObjectPath> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &&ObjectPath) -> bool {
        *self.data == *other.as_bytes()
    }
}

impl PartialEq<str> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        *self.data == *other.as_bytes()
    }
}

impl PartialEq<&str> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        *self.data == *other.as_bytes()
    }
}
