use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr::NonNull;

use tracing::{debug, warn};

/// An anonymous shared memory region, mapped into this process.
///
/// The descriptor can be passed to other processes which map the same pages. Dropping the
/// region unmaps it and closes the descriptor.
pub struct SharedMemory {
    fd: OwnedFd,
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
}

// The mapping is owned exclusively by this value and only handed out through borrows of it.
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl SharedMemory {
    /// Create a new zero-filled region of `len` bytes.
    pub fn create(len: usize, tag: &str) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }

        let name = CString::new(tag).unwrap_or_else(|_| c"pixmap".to_owned());
        let raw = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `memfd_create` returned a fresh descriptor that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let file = File::from(fd);
        file.set_len(len as u64)?;

        let region = Self::map(OwnedFd::from(file), len, true).map_err(|(_, err)| err)?;
        debug!(len, tag, fd = region.fd.as_raw_fd(), "created shared memory");
        Ok(region)
    }

    /// Map a region received from elsewhere.
    ///
    /// Tries a writable mapping first and falls back to a read-only one, for descriptors that
    /// were opened or sealed read-only.
    pub fn from_fd(fd: OwnedFd, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }

        let fd = match Self::map(fd, len, true) {
            Ok(region) => return Ok(region),
            Err((fd, err)) => {
                warn!(%err, "writable mapping failed, retrying read-only");
                fd
            }
        };

        Self::map(fd, len, false).map_err(|(_, err)| err)
    }

    fn map(fd: OwnedFd, len: usize, writable: bool) -> Result<Self, (OwnedFd, io::Error)> {
        let prot = if writable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };

        // SAFETY: a fresh mapping at an address of the kernel's choosing aliases nothing.
        let addr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                prot,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err((fd, io::Error::last_os_error()));
        }

        match NonNull::new(addr.cast::<u8>()) {
            Some(ptr) => Ok(SharedMemory {
                fd,
                ptr,
                len,
                writable,
            }),
            None => Err((fd, io::Error::from(io::ErrorKind::AddrNotAvailable))),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// A second descriptor for the same region, for sending it elsewhere.
    pub fn try_clone_fd(&self) -> io::Result<OwnedFd> {
        self.fd.try_clone()
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the mapping covers `len` readable bytes for as long as `self` lives.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        if !self.writable {
            return None;
        }

        // SAFETY: writable mapping of `len` bytes, uniquely borrowed through `self`.
        Some(unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        // SAFETY: `ptr` and `len` are exactly the mapping created in `map`.
        let result = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if result != 0 {
            warn!(err = %io::Error::last_os_error(), "munmap failed");
        }
        // The descriptor is closed by `OwnedFd`.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_mappings_share_pages() {
        let mut first = SharedMemory::create(4096, "shared-test").unwrap();
        first.bytes_mut().unwrap()[..4].copy_from_slice(b"abcd");

        let second = SharedMemory::from_fd(first.try_clone_fd().unwrap(), 4096).unwrap();
        assert!(second.is_writable());
        assert_eq!(&second.bytes()[..4], b"abcd");
    }

    #[test]
    fn read_only_fallback() {
        let mut region = SharedMemory::create(4096, "shared-test").unwrap();
        region.bytes_mut().unwrap()[0] = 42;

        // Reopening through procfs yields a descriptor without write access.
        let path = format!("/proc/self/fd/{}", region.as_fd().as_raw_fd());
        let file = File::open(path).unwrap();
        let mut read_only = SharedMemory::from_fd(OwnedFd::from(file), 4096).unwrap();
        assert!(!read_only.is_writable());
        assert!(read_only.bytes_mut().is_none());
        assert_eq!(read_only.bytes()[0], 42);
    }
}
