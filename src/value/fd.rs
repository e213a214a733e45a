use std::fmt;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::Arc;

/// An owned unix file descriptor carried inside a message body.
///
/// The descriptor is shared so that values remain cheap to clone; it is
/// closed once the last clone is dropped.
#[derive(Clone)]
pub struct UnixFd {
    fd: Arc<OwnedFd>,
}

impl UnixFd {
    /// Construct a new fd value taking ownership of the descriptor.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd: Arc::new(fd) }
    }

    /// Duplicate the underlying descriptor into a new owned handle.
    pub fn try_clone_to_owned(&self) -> io::Result<OwnedFd> {
        self.fd.try_clone()
    }
}

impl AsFd for UnixFd {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for UnixFd {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl From<OwnedFd> for UnixFd {
    #[inline]
    fn from(fd: OwnedFd) -> Self {
        Self::new(fd)
    }
}

impl PartialEq for UnixFd {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.fd.as_raw_fd() == other.fd.as_raw_fd()
    }
}

impl fmt::Debug for UnixFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnixFd").field(&self.fd.as_raw_fd()).finish()
    }
}
