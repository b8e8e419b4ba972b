// Key-addressed segments over shmget + shmat, with optional huge-page
// backing.

use std::io;
use std::ptr::{self, NonNull};

use crate::error::ShmError;

/// A System V shared memory segment, addressed by a 32-bit key.
///
/// Consumers may attach with either the key or the numeric segment id
/// obtained out-of-band; the mapped size is discovered with
/// `shmctl(IPC_STAT)`. The creating side marks the segment for removal on
/// drop, so the key disappears from the namespace while existing
/// attachments keep their mappings.
pub struct SysvShm {
    id: i32,
    ptr: NonNull<u8>,
    len: usize,
    owner: bool,
}

unsafe impl Send for SysvShm {}

impl SysvShm {
    /// Create a segment of `bytes` zero-filled bytes under `key`.
    ///
    /// With `huge_pages`, the segment is backed by huge pages via
    /// `SHM_HUGETLB`; if the host has none available the call fails with
    /// [`ShmError::Size`] instead of silently falling back.
    pub fn create(key: i32, bytes: usize, huge_pages: bool) -> Result<Self, ShmError> {
        if bytes == 0 {
            return Err(ShmError::Size("zero-byte segment".to_owned()));
        }

        let mut flags = libc::IPC_CREAT | libc::IPC_EXCL | 0o600;
        if huge_pages {
            #[cfg(target_os = "linux")]
            {
                flags |= libc::SHM_HUGETLB;
            }
            #[cfg(not(target_os = "linux"))]
            {
                return Err(ShmError::Size(
                    "huge pages are not supported on this platform".to_owned(),
                ));
            }
        }

        let id = unsafe { libc::shmget(key, bytes, flags) };
        if id == -1 {
            let err = io::Error::last_os_error();
            if huge_pages && err.raw_os_error() == Some(libc::ENOMEM) {
                return Err(ShmError::Size(format!(
                    "huge-page segment of {bytes} bytes unavailable: {err}"
                )));
            }
            return Err(ShmError::from_os(&key.to_string(), err));
        }

        let ptr = match at(id) {
            Ok(ptr) => ptr,
            Err(err) => {
                unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
                return Err(ShmError::Os(err));
            }
        };

        Ok(Self {
            id,
            ptr,
            len: bytes,
            owner: true,
        })
    }

    /// Attach to an existing segment by key.
    pub fn attach_key(key: i32) -> Result<Self, ShmError> {
        let id = unsafe { libc::shmget(key, 0, 0) };
        if id == -1 {
            return Err(ShmError::from_os(&key.to_string(), io::Error::last_os_error()));
        }
        Self::attach_id(id)
    }

    /// Attach to an existing segment by its numeric id.
    pub fn attach_id(id: i32) -> Result<Self, ShmError> {
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        if unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) } == -1 {
            return Err(ShmError::from_os(&id.to_string(), io::Error::last_os_error()));
        }
        let len = ds.shm_segsz as usize;

        let ptr = at(id).map_err(ShmError::Os)?;
        Ok(Self {
            id,
            ptr,
            len,
            owner: false,
        })
    }

    /// The kernel's segment id, shareable with consumers out-of-band.
    pub fn id(&self) -> i32 {
        self.id
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

impl Drop for SysvShm {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.ptr.as_ptr() as *const libc::c_void);
            if self.owner {
                libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut());
            }
        }
    }
}

fn at(id: i32) -> io::Result<NonNull<u8>> {
    let ptr = unsafe { libc::shmat(id, ptr::null(), 0) };
    if ptr as isize == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
}
