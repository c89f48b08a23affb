/// Define a wire-protocol newtype with named values.
///
/// The generated type is `repr(transparent)` over its wire representation,
/// so values outside the named set stay representable; unknown values
/// render their raw bits in `Debug` output.
#[doc(hidden)]
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[doc = $doc:literal])*
        #[repr($repr:ty)]
        $vis:vis enum $name:ident {
            $(
                $(#[$($value_meta:meta)*])*
                $value:ident = $raw:expr
            ),* $(,)?
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        $vis struct $name($repr);

        impl $name {
            $(
                $(#[$($value_meta)*])*
                $vis const $value: Self = Self($raw);
            )*

            /// Wrap a raw wire value, which may fall outside the named set.
            #[doc(hidden)]
            pub const fn from_raw(raw: $repr) -> Self {
                Self(raw)
            }

            /// The raw wire value.
            #[doc(hidden)]
            pub const fn raw(self) -> $repr {
                self.0
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match *self {
                    $(Self::$value => f.write_str(stringify!($value)),)*
                    other => write!(f, concat!(stringify!($name), "({:#04x})"), other.0),
                }
            }
        }
    }
}

/// Define a wire-protocol bit set with named flags.
///
/// Generated sets expose `contains`/`insert`/`remove` plus `|` for
/// combining flags; `Debug` renders the named flags separated by `|`.
#[doc(hidden)]
#[macro_export]
macro_rules! wire_flags {
    (
        $(#[doc = $doc:literal])*
        #[repr($repr:ty)]
        $vis:vis enum $name:ident {
            $(
                $(#[$($flag_meta:meta)*])*
                $flag:ident = $raw:expr
            ),* $(,)?
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Default, Clone, Copy, PartialEq, Eq)]
        #[repr(transparent)]
        $vis struct $name($repr);

        impl $name {
            $(
                $(#[$($flag_meta)*])*
                $vis const $flag: Self = Self($raw);
            )*

            /// Wrap a raw wire value, which may carry unknown bits.
            #[doc(hidden)]
            pub const fn from_raw(raw: $repr) -> Self {
                Self(raw)
            }

            /// The raw wire value.
            #[doc(hidden)]
            pub const fn raw(self) -> $repr {
                self.0
            }

            /// Test if every bit of `other` is set in `self`.
            #[doc(hidden)]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Set every bit of `other`.
            #[doc(hidden)]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear every bit of `other`.
            #[doc(hidden)]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl ::core::ops::BitOr<$name> for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: $name) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                let mut remaining = self.0;
                let mut first = true;

                $(
                    if $raw != 0 && remaining & $raw == $raw {
                        if !first {
                            f.write_str("|")?;
                        }

                        f.write_str(stringify!($flag))?;
                        remaining &= !$raw;
                        first = false;
                    }
                )*

                if remaining != 0 {
                    if !first {
                        f.write_str("|")?;
                    }

                    write!(f, "{remaining:#x}")?;
                    first = false;
                }

                if first {
                    f.write_str("(empty)")?;
                }

                Ok(())
            }
        }
    }
}
