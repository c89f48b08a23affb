use super::Signature;

/// The item yielded by the [`Iter`] iterator: one single complete type,
/// broken down by its outermost container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type<'a> {
    /// A basic type, or a variant.
    Basic(&'a Signature),
    /// An array carrying its element signature.
    Array(&'a Signature),
    /// A struct carrying its contents signature.
    Struct(&'a Signature),
    /// A dict entry carrying its key and value signatures.
    Dict(&'a Signature, &'a Signature),
}

/// An iterator over a signature which yields one [`Type`] at a time.
///
/// This is a thin layer over [`Signature::split_first`]: each step splits
/// off the leading complete type and classifies it.
pub struct Iter<'a> {
    rest: &'a Signature,
}

impl<'a> Iter<'a> {
    #[inline]
    pub(super) fn new(signature: &'a Signature) -> Iter<'a> {
        Iter { rest: signature }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Type<'a>;

    fn next(&mut self) -> Option<Type<'a>> {
        let rest = self.rest;
        let (head, tail) = rest.split_first()?;
        self.rest = tail;

        let bytes = head.as_bytes();

        Some(match bytes[0] {
            // SAFETY: Stripping the container framing of a complete type
            // leaves valid signatures behind.
            b'a' => Type::Array(unsafe { Signature::new_unchecked(&bytes[1..]) }),
            b'(' => {
                Type::Struct(unsafe { Signature::new_unchecked(&bytes[1..bytes.len() - 1]) })
            }
            b'{' => {
                let inner = unsafe { Signature::new_unchecked(&bytes[1..bytes.len() - 1]) };
                let (key, value) = inner.split_first()?;
                Type::Dict(key, value)
            }
            _ => Type::Basic(head),
        })
    }
}
