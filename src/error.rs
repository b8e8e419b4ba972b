// Error taxonomy for segment setup. Steady-state stream signals (Full,
// Again, Finished) are values in the produce/consume vocabulary, not
// errors; see `spmc`.

use std::io;

use thiserror::Error;

/// Failures while creating, attaching, or sizing a shared memory segment.
///
/// Role misuse (calling a producer method on a consumer) is rejected at
/// compile time: the two roles are distinct types with disjoint method
/// sets, so it has no runtime representation here.
#[derive(Debug, Error)]
pub enum ShmError {
    /// Producer-side create found the name or key already bound.
    #[error("segment `{0}` already exists")]
    SegmentExists(String),

    /// Consumer-side attach found nothing bound to the name or key.
    #[error("segment `{0}` does not exist")]
    SegmentMissing(String),

    /// The requested byte size is zero, overflows, or the OS refused to
    /// back it. Huge-page allocation failure lands here as well; there is
    /// no silent fallback to regular pages.
    #[error("bad segment size: {0}")]
    Size(String),

    /// File-mode check failed on create or attach.
    #[error("permission denied for segment `{0}`")]
    Permission(String),

    #[error(transparent)]
    Os(#[from] io::Error),
}

impl ShmError {
    /// Classify an OS error from a create/attach path against the segment
    /// identifier it was aimed at.
    pub(crate) fn from_os(id: &str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EEXIST) => ShmError::SegmentExists(id.to_owned()),
            Some(libc::ENOENT) => ShmError::SegmentMissing(id.to_owned()),
            Some(libc::EACCES) | Some(libc::EPERM) => ShmError::Permission(id.to_owned()),
            _ => ShmError::Os(err),
        }
    }
}

/// Returned by lock-free `produce` once the single-pass slot space is
/// spent. The buffer is sized for the entire stream; a full buffer is
/// terminal, not transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer capacity exhausted")]
pub struct Full;
