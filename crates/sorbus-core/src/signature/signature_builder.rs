use std::ops::Deref;

use super::signature_error::SignatureErrorKind;
use super::{
    Signature, SignatureBuf, SignatureError, MAX_ARRAY_NESTING, MAX_PAIR_NESTING,
    MAX_SIGNATURE_LEN,
};

/// An incremental D-Bus signature builder.
///
/// The builder enforces the protocol's length limit and container nesting
/// budgets as fragments are appended, so a fully closed builder always
/// holds a valid signature. It is the target of `Arg::signature`
/// implementations and of the message-level signature bookkeeping.
#[derive(Clone)]
pub struct SignatureBuilder {
    data: [u8; MAX_SIGNATURE_LEN],
    len: usize,
    arrays: usize,
    pairs: usize,
}

impl SignatureBuilder {
    /// Construct a new empty signature builder.
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_SIGNATURE_LEN],
            len: 0,
            arrays: 0,
            pairs: 0,
        }
    }

    /// Construct a builder holding an existing signature.
    pub fn from_signature<S>(signature: S) -> Self
    where
        S: AsRef<Signature>,
    {
        let mut this = Self::new();
        // Cannot overflow: a valid signature fits the builder.
        let _ = this.extend_from_signature(signature);
        this
    }

    /// Coerce into a borrowed signature.
    pub fn to_signature(&self) -> &Signature {
        // SAFETY: The builder only ever appends valid signature fragments.
        unsafe { Signature::new_unchecked(&self.data[..self.len]) }
    }

    /// Coerce into an owned signature.
    pub fn into_signature_buf(self) -> SignatureBuf {
        // SAFETY: The builder only ever appends valid signature fragments.
        unsafe { SignatureBuf::from_valid(&self.data[..self.len]) }
    }

    /// Open an array, i.e. append `a`.
    pub fn open_array(&mut self) -> Result<(), SignatureError> {
        if self.arrays == MAX_ARRAY_NESTING {
            return Err(SignatureError::new(SignatureErrorKind::NestingTooDeep, self.len));
        }

        self.push(b'a')?;
        self.arrays += 1;
        Ok(())
    }

    /// Close a previously opened array.
    pub fn close_array(&mut self) {
        self.arrays -= 1;
    }

    /// Open a struct, i.e. append `(`.
    pub fn open_struct(&mut self) -> Result<(), SignatureError> {
        if self.pairs == MAX_PAIR_NESTING {
            return Err(SignatureError::new(SignatureErrorKind::NestingTooDeep, self.len));
        }

        self.push(b'(')?;
        self.pairs += 1;
        Ok(())
    }

    /// Close a previously opened struct, i.e. append `)`.
    pub fn close_struct(&mut self) -> Result<(), SignatureError> {
        self.push(b')')?;
        self.pairs -= 1;
        Ok(())
    }

    /// Open a dict entry, i.e. append `{`. Dict entries only appear as the
    /// element of an array.
    pub fn open_dict_entry(&mut self) -> Result<(), SignatureError> {
        if self.pairs == MAX_PAIR_NESTING {
            return Err(SignatureError::new(SignatureErrorKind::NestingTooDeep, self.len));
        }

        self.push(b'{')?;
        self.pairs += 1;
        Ok(())
    }

    /// Close a previously opened dict entry, i.e. append `}`.
    pub fn close_dict_entry(&mut self) -> Result<(), SignatureError> {
        self.push(b'}')?;
        self.pairs -= 1;
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<(), SignatureError> {
        if self.len == MAX_SIGNATURE_LEN {
            return Err(SignatureError::too_long());
        }

        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Clear the builder.
    pub fn clear(&mut self) {
        self.len = 0;
        self.arrays = 0;
        self.pairs = 0;
    }

    /// Extend with a complete signature fragment.
    #[must_use = "Return value must be observed to indicate an error"]
    pub fn extend_from_signature<S>(&mut self, other: S) -> bool
    where
        S: AsRef<Signature>,
    {
        let bytes = other.as_ref().as_bytes();

        if self.len + bytes.len() > MAX_SIGNATURE_LEN {
            return false;
        }

        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }
}

impl Default for SignatureBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SignatureBuilder {
    type Target = Signature;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.to_signature()
    }
}

impl PartialEq<SignatureBuilder> for SignatureBuilder {
    #[inline]
    fn eq(&self, other: &SignatureBuilder) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SignatureBuilder {}
