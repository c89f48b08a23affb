use std::fmt;
use std::num::NonZeroU32;

/// The non-zero serial number of a message.
///
/// Replies link back to their call through it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Serial(NonZeroU32);

impl Serial {
    pub(crate) const fn new(value: NonZeroU32) -> Self {
        Self(value)
    }

    /// Get the underlying serial number.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for Serial {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Serial {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq<u32> for Serial {
    #[inline]
    fn eq(&self, other: &u32) -> bool {
        self.0.get() == *other
    }
}
