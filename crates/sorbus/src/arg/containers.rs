use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{name, Error};
use crate::signature::SignatureBuilder;
use crate::{signature_of, Message, Result, SignatureError};

use super::{Arg, BasicArg};

impl<T> Arg for Vec<T>
where
    T: Arg,
{
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        builder.open_array()?;
        T::signature(builder)?;
        builder.close_array();
        Ok(())
    }

    fn append(&self, message: &mut Message) -> Result<()> {
        let elements = signature_of::<T>()?;
        let writer = message.open_array_raw(&elements);

        for value in self {
            value.append(message)?;
        }

        message.close_array_raw(writer)
    }

    fn read(message: &mut Message) -> Result<Self> {
        let elements = signature_of::<T>()?;
        let reader = message.enter_array_raw(&elements)?;
        let mut values = Vec::new();

        while !message.array_raw_at_end(&reader) {
            values.push(T::read(message)?);
        }

        Ok(values)
    }
}

/// Fixed-length sequences share the wire shape of `Vec<T>`, with the length
/// verified when reading.
impl<T, const N: usize> Arg for [T; N]
where
    T: Arg,
{
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        <Vec<T>>::signature(builder)
    }

    fn append(&self, message: &mut Message) -> Result<()> {
        let elements = signature_of::<T>()?;
        let writer = message.open_array_raw(&elements);

        for value in self {
            value.append(message)?;
        }

        message.close_array_raw(writer)
    }

    fn read(message: &mut Message) -> Result<Self> {
        let values = <Vec<T>>::read(message)?;
        let len = values.len();

        values.try_into().map_err(|_| {
            Error::new(
                name::INVALID_ARGS,
                format!("expected array of length {N}, but it has {len} elements"),
            )
        })
    }
}

impl<K, V> Arg for HashMap<K, V>
where
    K: BasicArg + Eq + Hash,
    V: Arg,
{
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        builder.open_array()?;
        builder.open_dict_entry()?;
        K::signature(builder)?;
        V::signature(builder)?;
        builder.close_dict_entry()?;
        builder.close_array();
        Ok(())
    }

    fn append(&self, message: &mut Message) -> Result<()> {
        let mut elements = SignatureBuilder::new();
        elements.open_dict_entry()?;
        K::signature(&mut elements)?;
        V::signature(&mut elements)?;
        elements.close_dict_entry()?;

        let writer = message.open_array_raw(elements.to_signature());

        for (key, value) in self {
            message.align_write(8);
            key.append(message)?;
            value.append(message)?;
        }

        message.close_array_raw(writer)
    }

    fn read(message: &mut Message) -> Result<Self> {
        let mut elements = SignatureBuilder::new();
        elements.open_dict_entry()?;
        K::signature(&mut elements)?;
        V::signature(&mut elements)?;
        elements.close_dict_entry()?;

        let reader = message.enter_array_raw(elements.to_signature())?;
        let mut map = HashMap::new();

        while !message.array_raw_at_end(&reader) {
            message.align_read(8)?;
            let key = K::read(message)?;
            let value = V::read(message)?;
            map.insert(key, value);
        }

        Ok(map)
    }
}

macro_rules! impl_tuple {
    ($($ty:ident),*) => {
        /// Tuples serialize as structs of their fields.
        impl<$($ty,)*> Arg for ($($ty,)*)
        where
            $($ty: Arg,)*
        {
            fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
                builder.open_struct()?;
                $(<$ty>::signature(builder)?;)*
                builder.close_struct()?;
                Ok(())
            }

            #[allow(non_snake_case)]
            fn append(&self, message: &mut Message) -> Result<()> {
                message.align_write(8);
                let ($($ty,)*) = self;
                $(<$ty as Arg>::append($ty, message)?;)*
                Ok(())
            }

            fn read(message: &mut Message) -> Result<Self> {
                message.align_read(8)?;
                Ok(($(<$ty as Arg>::read(message)?,)*))
            }
        }
    }
}

impl_for_tuples!(impl_tuple);
