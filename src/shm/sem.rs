// Process-shared POSIX semaphore helpers. The sem_t lives inside the
// mapped segment; only the creating process initialises it.

use std::io;

/// Initialise a semaphore embedded in shared memory (`pshared = 1`).
///
/// # Safety
/// `sem` must point into a live read-write mapping and must not be in use
/// by any other process yet.
pub(crate) unsafe fn init(sem: *mut libc::sem_t, value: u32) -> io::Result<()> {
    if libc::sem_init(sem, 1, value) == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Wait on a semaphore, retrying when interrupted by a signal.
///
/// # Safety
/// `sem` must point at a semaphore initialised with [`init`] in a mapping
/// that outlives the call.
pub(crate) unsafe fn wait(sem: *mut libc::sem_t) {
    loop {
        if libc::sem_wait(sem) == 0 {
            return;
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            debug_assert!(false, "sem_wait failed: {err}");
            return;
        }
    }
}

/// Post a semaphore.
///
/// # Safety
/// Same contract as [`wait`].
pub(crate) unsafe fn post(sem: *mut libc::sem_t) {
    let rc = libc::sem_post(sem);
    debug_assert_eq!(rc, 0, "sem_post failed");
}
