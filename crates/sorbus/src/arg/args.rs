use crate::signature::SignatureBuilder;
use crate::{Message, Result, SignatureError};

use super::Arg;

/// A list of values used as the arguments of a call, a reply or a signal.
///
/// Unlike a tuple appended as a single [`Arg`] this does not wrap the values
/// in a struct; every element is a separate top-level value.
///
/// # Examples
///
/// ```
/// use sorbus::Message;
///
/// let mut m = Message::plain();
/// m.append_all(&(5i64, 2.0f64))?;
/// m.seal()?;
///
/// assert_eq!(m.signature(), "xd");
/// assert_eq!(m.read_all::<(i64, f64)>()?, (5, 2.0));
/// # Ok::<_, sorbus::Error>(())
/// ```
pub trait Args: Sized {
    /// Append the signatures of every element.
    #[doc(hidden)]
    fn signatures(builder: &mut SignatureBuilder) -> Result<(), SignatureError>;

    /// Append every element as a top-level value.
    #[doc(hidden)]
    fn append_to(&self, message: &mut Message) -> Result<()>;

    /// Read every element as a top-level value.
    #[doc(hidden)]
    fn read_from(message: &mut Message) -> Result<Self>;
}

impl Args for () {
    #[inline]
    fn signatures(_: &mut SignatureBuilder) -> Result<(), SignatureError> {
        Ok(())
    }

    #[inline]
    fn append_to(&self, _: &mut Message) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn read_from(_: &mut Message) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_args {
    ($($ty:ident),*) => {
        impl<$($ty,)*> Args for ($($ty,)*)
        where
            $($ty: Arg,)*
        {
            fn signatures(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
                $(<$ty>::signature(builder)?;)*
                Ok(())
            }

            #[allow(non_snake_case)]
            fn append_to(&self, message: &mut Message) -> Result<()> {
                let ($($ty,)*) = self;
                $(message.append($ty)?;)*
                Ok(())
            }

            fn read_from(message: &mut Message) -> Result<Self> {
                Ok(($(message.read::<$ty>()?,)*))
            }
        }
    }
}

impl_for_tuples!(impl_args);
