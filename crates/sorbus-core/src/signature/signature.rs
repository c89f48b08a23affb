use std::fmt;
use std::str::from_utf8_unchecked;

use super::{complete_len, validate, Iter, SignatureBuf, SignatureError};

/// A validated D-Bus signature: zero or more single complete types over the
/// wire type alphabet.
///
/// This is the borrowed form; [`SignatureBuf`] is its owned counterpart.
///
/// # Examples
///
/// ```
/// use sorbus::Signature;
///
/// const PROPS: &Signature = Signature::new_const(b"a{sv}");
///
/// assert!(Signature::new(b"a(ii)").is_ok());
/// assert!(Signature::new(b"a").is_err());
/// ```
#[derive(PartialEq, Eq)]
#[repr(transparent)]
pub struct Signature([u8]);

impl Signature {
    /// The empty signature.
    pub const EMPTY: &'static Signature = Signature::new_const(b"");

    /// A single byte.
    pub const BYTE: &'static Signature = Signature::new_const(b"y");

    /// A boolean value.
    pub const BOOLEAN: &'static Signature = Signature::new_const(b"b");

    /// Signed (two's complement) 16-bit integer.
    pub const INT16: &'static Signature = Signature::new_const(b"n");

    /// Unsigned 16-bit integer.
    pub const UINT16: &'static Signature = Signature::new_const(b"q");

    /// Signed (two's complement) 32-bit integer.
    pub const INT32: &'static Signature = Signature::new_const(b"i");

    /// Unsigned 32-bit integer.
    pub const UINT32: &'static Signature = Signature::new_const(b"u");

    /// Signed (two's complement) 64-bit integer.
    pub const INT64: &'static Signature = Signature::new_const(b"x");

    /// Unsigned 64-bit integer.
    pub const UINT64: &'static Signature = Signature::new_const(b"t");

    /// IEEE 754 double-precision floating point.
    pub const DOUBLE: &'static Signature = Signature::new_const(b"d");

    /// The signature of a nul-terminated string.
    pub const STRING: &'static Signature = Signature::new_const(b"s");

    /// The signature of an object path.
    pub const OBJECT_PATH: &'static Signature = Signature::new_const(b"o");

    /// The signature of a [`Signature`].
    pub const SIGNATURE: &'static Signature = Signature::new_const(b"g");

    /// Unsigned 32-bit integer indexing an out-of-band array of file
    /// descriptors (mnemonic: h for handle).
    pub const UNIX_FD: &'static Signature = Signature::new_const(b"h");

    /// The signature of a variant value.
    pub const VARIANT: &'static Signature = Signature::new_const(b"v");

    /// The `a{sv}` shape used by the standard properties interfaces.
    pub const DICT_SV: &'static Signature = Signature::new_const(b"a{sv}");

    /// Construct a new signature with validation inside of a constant
    /// context.
    ///
    /// This will panic in case the signature is invalid.
    ///
    /// ```compile_fail
    /// use sorbus::Signature;
    ///
    /// const BAD: &Signature = Signature::new_const(b"(a)");
    /// ```
    #[inline]
    #[track_caller]
    pub const fn new_const(signature: &[u8]) -> &Signature {
        if validate(signature).is_err() {
            panic!("Invalid D-Bus signature")
        };

        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Self::new_unchecked(signature) }
    }

    /// Try to construct a new signature with validation.
    #[inline]
    pub fn new<S>(signature: &S) -> Result<&Signature, SignatureError>
    where
        S: ?Sized + AsRef<[u8]>,
    {
        let signature = signature.as_ref();
        validate(signature)?;
        // SAFETY: The byte slice is repr transparent over this type.
        unsafe { Ok(Self::new_unchecked(signature)) }
    }

    /// Construct a new signature without validation. The caller is
    /// responsible for ensuring that the signature is valid.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the signature is a valid signature.
    #[inline]
    pub const unsafe fn new_unchecked(signature: &[u8]) -> &Self {
        &*(signature as *const _ as *const Signature)
    }

    /// Construct a new empty signature.
    pub const fn empty() -> &'static Self {
        Self::EMPTY
    }

    /// Test if the signature is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the length of the signature in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the single complete types of this signature.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Split off the leading single complete type.
    ///
    /// Returns the first complete type and the remainder, or `None` when
    /// the signature is empty. This is the primitive which runtime type
    /// checking of message reads is built from.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::Signature;
    ///
    /// let sig = Signature::new(b"a{sv}ub")?;
    /// let (head, tail) = sig.split_first().unwrap();
    ///
    /// assert_eq!(head, "a{sv}");
    /// assert_eq!(tail, "ub");
    /// # Ok::<_, sorbus::SignatureError>(())
    /// ```
    pub fn split_first(&self) -> Option<(&Signature, &Signature)> {
        if self.0.is_empty() {
            return None;
        }

        let n = complete_len(&self.0, 0);

        // SAFETY: Both halves of a valid signature split at a complete type
        // boundary remain valid signatures.
        unsafe {
            Some((
                Signature::new_unchecked(&self.0[..n]),
                Signature::new_unchecked(&self.0[n..]),
            ))
        }
    }

    /// Test if this signature consists of exactly one single complete type.
    pub fn is_single_complete_type(&self) -> bool {
        !self.0.is_empty() && complete_len(&self.0, 0) == self.0.len()
    }

    /// Get the signature as a string.
    pub fn as_str(&self) -> &str {
        // SAFETY: The type alphabet is ASCII, so a validated signature is
        // valid UTF-8.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Get the signature as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Display for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<Signature> for Signature {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl ToOwned for Signature {
    type Owned = SignatureBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: `self` is already a validated signature.
        unsafe { SignatureBuf::from_valid(&self.0) }
    }
}

impl PartialEq<str> for Signature {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl PartialEq<&str> for Signature {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other.as_bytes()
    }
}
