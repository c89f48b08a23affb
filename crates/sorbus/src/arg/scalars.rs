use crate::error::{name, Error};
use crate::frame::Frame;
use crate::signature::SignatureBuilder;
use crate::{
    Message, ObjectPathBuf, Result, Signature, SignatureBuf, SignatureError,
};

use super::{Arg, BasicArg};

fn extend(builder: &mut SignatureBuilder, signature: &Signature) -> Result<(), SignatureError> {
    if !builder.extend_from_signature(signature) {
        return Err(SignatureError::too_long());
    }

    Ok(())
}

macro_rules! impl_frame_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Arg for $ty {
                #[inline]
                fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
                    extend(builder, <$ty as Frame>::SIGNATURE)
                }

                #[inline]
                fn append(&self, message: &mut Message) -> Result<()> {
                    message.write_frame_raw(*self);
                    Ok(())
                }

                #[inline]
                fn read(message: &mut Message) -> Result<Self> {
                    message.read_frame_raw()
                }
            }

            impl BasicArg for $ty {}
        )*
    }
}

impl_frame_arg!(u8, i16, u16, i32, u32, i64, u64, f64);

impl Arg for bool {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        extend(builder, Signature::BOOLEAN)
    }

    #[inline]
    fn append(&self, message: &mut Message) -> Result<()> {
        message.write_frame_raw(u32::from(*self));
        Ok(())
    }

    #[inline]
    fn read(message: &mut Message) -> Result<Self> {
        match message.read_frame_raw::<u32>()? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(Error::new(
                name::INCONSISTENT_MESSAGE,
                format!("invalid boolean value {n}"),
            )),
        }
    }
}

impl BasicArg for bool {}

impl Arg for String {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        extend(builder, Signature::STRING)
    }

    #[inline]
    fn append(&self, message: &mut Message) -> Result<()> {
        message.write_string_raw(self);
        Ok(())
    }

    #[inline]
    fn read(message: &mut Message) -> Result<Self> {
        message.read_string_raw()
    }
}

impl BasicArg for String {}

impl Arg for ObjectPathBuf {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        extend(builder, Signature::OBJECT_PATH)
    }

    #[inline]
    fn append(&self, message: &mut Message) -> Result<()> {
        message.write_string_raw(self.as_str());
        Ok(())
    }

    #[inline]
    fn read(message: &mut Message) -> Result<Self> {
        message.read_path_raw()
    }
}

impl BasicArg for ObjectPathBuf {}

impl Arg for SignatureBuf {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        extend(builder, Signature::SIGNATURE)
    }

    #[inline]
    fn append(&self, message: &mut Message) -> Result<()> {
        message.write_signature_raw(self);
        Ok(())
    }

    #[inline]
    fn read(message: &mut Message) -> Result<Self> {
        message.read_signature_raw()
    }
}

impl BasicArg for SignatureBuf {}
