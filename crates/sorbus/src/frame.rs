use crate::proto::Endianness;
use crate::Signature;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A fixed-size value copied verbatim to and from the wire, subject only to
/// endianness adjustment.
///
/// This is implemented for the primitive numeric types and for the raw
/// protocol newtypes. Wire alignment equals the size of the frame.
pub trait Frame: self::sealed::Sealed + Copy {
    /// The signature of the frame.
    #[doc(hidden)]
    const SIGNATURE: &'static Signature;

    /// The size, and therefore the alignment, of the frame on the wire.
    #[doc(hidden)]
    const SIZE: usize;

    /// Serialize the frame into `out` which is exactly `SIZE` bytes.
    #[doc(hidden)]
    fn put(self, out: &mut [u8], endianness: Endianness);

    /// Deserialize the frame from `bytes` which is exactly `SIZE` bytes.
    #[doc(hidden)]
    fn get(bytes: &[u8], endianness: Endianness) -> Self;
}

macro_rules! impl_number {
    ($($ty:ty, $signature:ident),* $(,)?) => {
        $(
            impl self::sealed::Sealed for $ty {}

            impl Frame for $ty {
                const SIGNATURE: &'static Signature = Signature::$signature;
                const SIZE: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn put(self, out: &mut [u8], endianness: Endianness) {
                    let bytes = match endianness {
                        Endianness::BIG => self.to_be_bytes(),
                        _ => self.to_le_bytes(),
                    };

                    out.copy_from_slice(&bytes);
                }

                #[inline]
                fn get(bytes: &[u8], endianness: Endianness) -> Self {
                    let bytes = bytes.try_into().expect("frame size mismatch");

                    match endianness {
                        Endianness::BIG => <$ty>::from_be_bytes(bytes),
                        _ => <$ty>::from_le_bytes(bytes),
                    }
                }
            }
        )*
    }
}

impl_number!(u8, BYTE, i16, INT16, u16, UINT16, i32, INT32, u32, UINT32);
impl_number!(i64, INT64, u64, UINT64);

impl self::sealed::Sealed for f64 {}

impl Frame for f64 {
    const SIGNATURE: &'static Signature = Signature::DOUBLE;
    const SIZE: usize = 8;

    #[inline]
    fn put(self, out: &mut [u8], endianness: Endianness) {
        self.to_bits().put(out, endianness);
    }

    #[inline]
    fn get(bytes: &[u8], endianness: Endianness) -> Self {
        f64::from_bits(u64::get(bytes, endianness))
    }
}

macro_rules! impl_raw {
    ($($ty:ty),* $(,)?) => {
        $(
            impl self::sealed::Sealed for $ty {}

            impl Frame for $ty {
                const SIGNATURE: &'static Signature = Signature::BYTE;
                const SIZE: usize = 1;

                #[inline]
                fn put(self, out: &mut [u8], endianness: Endianness) {
                    self.raw().put(out, endianness);
                }

                #[inline]
                fn get(bytes: &[u8], endianness: Endianness) -> Self {
                    Self::from_raw(u8::get(bytes, endianness))
                }
            }
        )*
    }
}

impl_raw!(
    crate::proto::Endianness,
    crate::proto::MessageType,
    crate::proto::Flags,
    crate::proto::HeaderField,
    crate::proto::Type,
);
