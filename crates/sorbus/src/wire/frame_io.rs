use crate::error::{name, Error, Result};
use crate::frame::Frame;
use crate::proto::Endianness;

use super::padding_to;

fn underflow() -> Error {
    Error::new(name::INCONSISTENT_MESSAGE, "buffer underflow")
}

/// Read a [`Frame`] at `*pos`, aligning the cursor first and advancing it
/// past the value.
pub(crate) fn read_frame<T>(bytes: &[u8], pos: &mut usize, endianness: Endianness) -> Result<T>
where
    T: Frame,
{
    let at = *pos + padding_to(T::SIZE, *pos);

    let Some(slice) = bytes.get(at..at + T::SIZE) else {
        return Err(underflow());
    };

    *pos = at + T::SIZE;
    Ok(T::get(slice, endianness))
}

/// Read `len` bytes at `*pos`, advancing the cursor.
pub(crate) fn read_slice<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let Some(slice) = bytes.get(*pos..*pos + len) else {
        return Err(underflow());
    };

    *pos += len;
    Ok(slice)
}

/// Read `len` bytes followed by a NUL byte at `*pos`, advancing the cursor
/// past the terminator.
pub(crate) fn read_slice_nul<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let Some(slice) = bytes.get(*pos..*pos + len + 1) else {
        return Err(underflow());
    };

    if slice[len] != 0 {
        return Err(Error::new(
            name::INCONSISTENT_MESSAGE,
            "string is not nul terminated",
        ));
    }

    *pos += len + 1;
    Ok(&slice[..len])
}
