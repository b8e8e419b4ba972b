// Name-addressed segments over shm_open + mmap.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};

use crate::error::ShmError;

/// A POSIX shared memory segment, addressed by a name such as `/kline_q`.
///
/// The creating side owns the name: dropping it unlinks the segment so no
/// new consumer can attach, while mappings held by already-attached
/// consumers stay valid until they unmap.
pub struct PosixShm {
    name: CString,
    ptr: NonNull<u8>,
    len: usize,
    owner: bool,
}

unsafe impl Send for PosixShm {}

impl PosixShm {
    /// Create a segment of `bytes` zero-filled bytes, mapped read-write.
    ///
    /// Creation is racy-exclusive: an existing segment of the same name
    /// fails with [`ShmError::SegmentExists`] rather than being reused.
    /// Mode is 0600; file permissions are the only access control.
    pub fn create(name: &str, bytes: usize) -> Result<Self, ShmError> {
        if bytes == 0 {
            return Err(ShmError::Size("zero-byte segment".to_owned()));
        }
        let c_name = cstr(name)?;

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };
        if fd == -1 {
            return Err(ShmError::from_os(name, io::Error::last_os_error()));
        }

        if unsafe { libc::ftruncate(fd, bytes as libc::off_t) } == -1 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(ShmError::Size(format!(
                "ftruncate of `{name}` to {bytes} bytes failed: {err}"
            )));
        }

        let ptr = match map(fd, bytes, false) {
            Ok(ptr) => ptr,
            Err(err) => {
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(ShmError::Os(err));
            }
        };
        unsafe { libc::close(fd) };

        Ok(Self {
            name: c_name,
            ptr,
            len: bytes,
            owner: true,
        })
    }

    /// Attach to an existing segment knowing only its name.
    ///
    /// The slot capacity is read from the leading u64 of the header through
    /// a one-page probe mapping, `size_for` turns it into the full byte
    /// size for the caller's record type, and the region is then mapped at
    /// that size. Returns the mapping together with the capacity.
    ///
    /// Lock-free consumers pass `read_only` and get a `PROT_READ` mapping;
    /// the blocking variant maps read-write on both roles.
    pub fn attach<F>(name: &str, read_only: bool, size_for: F) -> Result<(Self, u64), ShmError>
    where
        F: FnOnce(u64) -> Result<usize, ShmError>,
    {
        let c_name = cstr(name)?;
        let oflag = if read_only { libc::O_RDONLY } else { libc::O_RDWR };

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), oflag, 0o600) };
        if fd == -1 {
            return Err(ShmError::from_os(name, io::Error::last_os_error()));
        }

        let capacity = match probe_capacity(fd) {
            Ok(capacity) => capacity,
            Err(err) => {
                unsafe { libc::close(fd) };
                return Err(ShmError::Os(err));
            }
        };
        let bytes = match size_for(capacity) {
            Ok(bytes) => bytes,
            Err(err) => {
                unsafe { libc::close(fd) };
                return Err(err);
            }
        };

        let ptr = match map(fd, bytes, read_only) {
            Ok(ptr) => ptr,
            Err(err) => {
                unsafe { libc::close(fd) };
                return Err(ShmError::Os(err));
            }
        };
        unsafe { libc::close(fd) };

        Ok((
            Self {
                name: c_name,
                ptr,
                len: bytes,
                owner: false,
            },
            capacity,
        ))
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PosixShm {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            if self.owner {
                libc::shm_unlink(self.name.as_ptr());
            }
        }
    }
}

fn cstr(name: &str) -> Result<CString, ShmError> {
    CString::new(name).map_err(|_| {
        ShmError::Os(io::Error::new(
            io::ErrorKind::InvalidInput,
            "segment name contains a NUL byte",
        ))
    })
}

/// Map `len` bytes of `fd` as a shared mapping.
fn map(fd: RawFd, len: usize, read_only: bool) -> io::Result<NonNull<u8>> {
    let prot = if read_only {
        libc::PROT_READ
    } else {
        libc::PROT_READ | libc::PROT_WRITE
    };
    let ptr = unsafe { libc::mmap(ptr::null_mut(), len, prot, libc::MAP_SHARED, fd, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    // mmap never returns null on success
    Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
}

/// Read the leading capacity word through a temporary one-page mapping.
fn probe_capacity(fd: RawFd) -> io::Result<u64> {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let probe = map(fd, page, true)?;
    let capacity = unsafe { ptr::read_volatile(probe.as_ptr() as *const u64) };
    unsafe { libc::munmap(probe.as_ptr() as *mut libc::c_void, page) };
    Ok(capacity)
}
