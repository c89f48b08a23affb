use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use crate::arg::{Arg, BasicArg};
use crate::signature::SignatureBuilder;
use crate::{Message, Result, Signature, SignatureError};

/// A unix file descriptor travelling in a message body.
///
/// On the wire this is an index into the message's out-of-band descriptor
/// table. The descriptor itself is shared, so cloning a `UnixFd` does not
/// duplicate it.
#[derive(Clone)]
pub struct UnixFd {
    fd: Arc<OwnedFd>,
}

impl UnixFd {
    /// Wrap an owned file descriptor.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd: Arc::new(fd) }
    }

    pub(crate) fn from_shared(fd: Arc<OwnedFd>) -> Self {
        Self { fd }
    }
}

impl From<OwnedFd> for UnixFd {
    #[inline]
    fn from(fd: OwnedFd) -> Self {
        Self::new(fd)
    }
}

impl AsRawFd for UnixFd {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl fmt::Debug for UnixFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnixFd").field(&self.as_raw_fd()).finish()
    }
}

impl Arg for UnixFd {
    #[inline]
    fn signature(builder: &mut SignatureBuilder) -> Result<(), SignatureError> {
        if !builder.extend_from_signature(Signature::UNIX_FD) {
            return Err(SignatureError::too_long());
        }

        Ok(())
    }

    #[inline]
    fn append(&self, message: &mut Message) -> Result<()> {
        let index = message.push_fd(self.fd.clone());
        message.write_frame_raw(index);
        Ok(())
    }

    #[inline]
    fn read(message: &mut Message) -> Result<Self> {
        let index = message.read_frame_raw::<u32>()?;
        Ok(Self::from_shared(message.fd_at(index)?))
    }
}

impl BasicArg for UnixFd {}
