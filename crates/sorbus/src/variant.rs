use std::fmt;

use crate::arg::Arg;
use crate::error::{name, Error, Result};
use crate::proto;
use crate::signature::SignatureBuilder;
use crate::{signature_of, Message, Signature, SignatureBuf, SignatureError};

/// A self-describing value: a signature paired with a small owned
/// [`Message`] carrying exactly one serialized value of that signature.
///
/// # Examples
///
/// ```
/// use sorbus::Variant;
///
/// let v = Variant::new(&1234u32)?;
/// assert_eq!(v.signature(), "u");
/// assert_eq!(v.get::<u32>()?, 1234);
///
/// // Reading with the wrong type fails without consuming anything.
/// assert!(v.get::<String>().is_err());
/// assert_eq!(v.get::<u32>()?, 1234);
/// # Ok::<_, sorbus::Error>(())
/// ```
pub struct Variant {
    signature: SignatureBuf,
    contents: Message,
}

impl Variant {
    /// Construct a variant wrapping the given value.
    pub fn new<T>(value: &T) -> Result<Self>
    where
        T: Arg,
    {
        let signature = signature_of::<T>()?;
        let mut contents = Message::plain();
        contents.append(value)?;
        contents.seal()?;

        Ok(Self {
            signature,
            contents,
        })
    }

    /// Construct an empty variant carrying no value.
    pub fn empty() -> Self {
        let mut contents = Message::plain();
        // An empty body seals trivially.
        contents.seal().expect("sealing an empty message");

        Self {
            signature: SignatureBuf::empty(),
            contents,
        }
    }

    /// Test if the variant carries no value.
    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    /// The signature of the contained value.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The primary type of the contained value and, for containers, its
    /// contents signature.
    pub fn peek_type(&self) -> Result<Option<(proto::Type, Option<SignatureBuf>)>> {
        let mut contents = self.contents.clone();
        let _ = contents.rewind(true);
        contents.peek_type()
    }

    /// Extract the contained value.
    ///
    /// Fails with an `org.freedesktop.DBus.Error.InvalidArgs` error if `T`
    /// does not match the contained signature.
    pub fn get<T>(&self) -> Result<T>
    where
        T: Arg,
    {
        let mut contents = self.contents.clone();
        contents.rewind(true)?;
        contents.read()
    }

    pub(crate) fn contents(&self) -> &Message {
        &self.contents
    }

    pub(crate) fn from_contents(signature: SignatureBuf, contents: Message) -> Self {
        Self {
            signature,
            contents,
        }
    }
}

impl Clone for Variant {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            contents: self.contents.clone(),
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("signature", &self.signature)
            .finish()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
            && self.contents.body_bytes() == other.contents.body_bytes()
    }
}

impl Arg for Variant {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        if !builder.extend_from_signature(Signature::VARIANT) {
            return Err(SignatureError::too_long());
        }

        Ok(())
    }

    fn append(&self, message: &mut Message) -> Result<()> {
        if self.is_empty() {
            return Err(Error::new(
                name::INVALID_ARGS,
                "cannot serialize an empty variant",
            ));
        }

        message.write_signature_raw(&self.signature);
        let mut source = self.contents.clone();
        source.rewind(true)?;
        let signature = self.signature.clone();
        message.append_value_from(&mut source, &signature)
    }

    fn read(message: &mut Message) -> Result<Self> {
        let signature = message.read_signature_raw()?;

        if !signature.is_single_complete_type() {
            return Err(Error::new(
                name::INCONSISTENT_MESSAGE,
                "variant signature is not a single complete type",
            ));
        }

        let mut contents = Message::plain();
        contents.append_value_from(message, &signature)?;
        contents.seal()?;
        Ok(Self::from_contents(signature, contents))
    }
}
