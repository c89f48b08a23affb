use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{validate, Signature, SignatureError, MAX_SIGNATURE_LEN};

/// An owned, validated D-Bus signature.
///
/// Signatures are bounded at 255 bytes by the protocol, so the storage is a
/// plain inline array and cloning never allocates. Dereferences to
/// [`Signature`].
#[derive(Clone)]
pub struct SignatureBuf {
    data: [u8; MAX_SIGNATURE_LEN],
    len: usize,
}

impl SignatureBuf {
    /// Construct a new empty signature.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::SignatureBuf;
    ///
    /// let sig = SignatureBuf::empty();
    /// assert!(sig.is_empty());
    /// ```
    pub const fn empty() -> Self {
        Self {
            data: [0; MAX_SIGNATURE_LEN],
            len: 0,
        }
    }

    /// Construct a new signature with validation inside of a constant
    /// context.
    ///
    /// This will panic in case the signature is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use sorbus::SignatureBuf;
    ///
    /// const SIG: SignatureBuf = SignatureBuf::new_const(b"i(ai)");
    /// ```
    #[inline]
    #[track_caller]
    pub const fn new_const(signature: &[u8]) -> SignatureBuf {
        if validate(signature).is_err() {
            panic!("Invalid D-Bus signature")
        };

        let mut data = [0; MAX_SIGNATURE_LEN];
        let mut n = 0;

        while n < signature.len() {
            data[n] = signature[n];
            n += 1;
        }

        Self {
            data,
            len: signature.len(),
        }
    }

    /// Try to construct a new signature with validation.
    #[inline]
    pub fn new(signature: &[u8]) -> Result<Self, SignatureError> {
        validate(signature)?;
        // SAFETY: Just validated above.
        unsafe { Ok(Self::from_valid(signature)) }
    }

    /// Construct an owned signature from already validated bytes.
    ///
    /// # Safety
    ///
    /// The bytes must be a valid signature: the validity invariant backs
    /// the unchecked [`Signature`] this buffer dereferences to.
    pub(crate) unsafe fn from_valid(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= MAX_SIGNATURE_LEN);
        let mut this = Self::empty();
        this.data[..bytes.len()].copy_from_slice(bytes);
        this.len = bytes.len();
        this
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl fmt::Debug for SignatureBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignatureBuf").field(&self.as_str()).finish()
    }
}

impl fmt::Display for SignatureBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Deref for SignatureBuf {
    type Target = Signature;

    fn deref(&self) -> &Self::Target {
        // SAFETY: Construction of SignatureBuf ensures that the signature
        // is valid.
        unsafe { Signature::new_unchecked(self.as_slice()) }
    }
}

impl Borrow<Signature> for SignatureBuf {
    #[inline]
    fn borrow(&self) -> &Signature {
        self
    }
}

impl AsRef<Signature> for SignatureBuf {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl PartialEq<SignatureBuf> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &SignatureBuf) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for SignatureBuf {}

impl PartialEq<str> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_slice() == other.as_bytes()
    }
}
