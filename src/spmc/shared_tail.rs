// Lock-free buffer indexed by a shared monotonic tail.
//
// The producer is the only writer of `tail`; each consumer owns a private
// `head` plus a cached snapshot of the tail. The release store on `tail`
// publishes the slot bytes, the consumer's acquire reload observes them.
// Cursors are single-pass indices in `[0, cap]`: once the producer has
// written `cap` records the stream is over, there is no wrap.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{fence, Ordering};

use bytemuck::Pod;

use crate::error::{Full, ShmError};
use crate::shm::PosixShm;

use super::layout::{self, SharedTailHeader};
use super::Consumed;

/// The writing side. Dropping it publishes end-of-stream and unlinks the
/// segment name.
pub struct Producer<T> {
    _seg: PosixShm,
    header: *mut SharedTailHeader,
    slots: *mut T,
    /// Mirror of the shared tail; the producer is its sole writer, so no
    /// atomic load is needed on the hot path.
    tail: u64,
    _marker: PhantomData<T>,
}

/// A reading side with a private cursor. Every consumer observes the
/// complete stream in production order, independent of the others.
pub struct Consumer<T> {
    _seg: PosixShm,
    header: *const SharedTailHeader,
    slots: *const T,
    head: u64,
    /// Last observed value of the shared tail. Reloading the shared word
    /// costs a coherence miss against the producer's writes, so it is
    /// refreshed only when the cursor catches up.
    cached_tail: u64,
    done: bool,
    _marker: PhantomData<T>,
}

unsafe impl<T: Pod> Send for Producer<T> {}
unsafe impl<T: Pod> Send for Consumer<T> {}

impl<T: Pod> Producer<T> {
    /// Create the segment under `name`, sized for `capacity` records.
    pub fn create(name: &str, capacity: u64) -> Result<Self, ShmError> {
        let bytes = layout::shared_tail_bytes::<T>(capacity)?;
        let seg = PosixShm::create(name, bytes)?;

        let header = seg.as_ptr() as *mut SharedTailHeader;
        // tail and finished start at zero from the fresh mapping
        unsafe { ptr::addr_of_mut!((*header).cap).write(capacity) };
        let slots = unsafe { seg.as_ptr().add(layout::shared_tail_slots_offset::<T>()) } as *mut T;

        Ok(Self {
            _seg: seg,
            header,
            slots,
            tail: 0,
            _marker: PhantomData,
        })
    }

    /// Publish `item` into the next slot.
    ///
    /// The slot bytes are written before the release store on `tail`, so a
    /// consumer that observes the new index also observes the record.
    pub fn produce(&mut self, item: &T) -> Result<(), Full> {
        if self.tail == self.capacity() {
            return Err(Full);
        }
        unsafe {
            self.slots.add(self.tail as usize).write(*item);
            (*self.header).tail.store(self.tail + 1, Ordering::Release);
        }
        self.tail += 1;
        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        // End-of-stream must be visible before the name disappears, so the
        // flag is published ahead of the unlink in the segment's drop.
        unsafe { (*self.header).finished.store(1, Ordering::Release) };
        fence(Ordering::SeqCst);
    }
}

impl<T: Pod> Consumer<T> {
    /// Attach read-only to an existing segment; the capacity is discovered
    /// from the segment header.
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        let (seg, _) = PosixShm::attach(name, true, |cap| layout::shared_tail_bytes::<T>(cap))?;

        let header = seg.as_ptr() as *const SharedTailHeader;
        let slots = unsafe { seg.as_ptr().add(layout::shared_tail_slots_offset::<T>()) } as *const T;

        Ok(Self {
            _seg: seg,
            header,
            slots,
            head: 0,
            cached_tail: 0,
            done: false,
            _marker: PhantomData,
        })
    }

    /// One receive step. On [`Consumed::Again`] the caller decides whether
    /// to spin, back off, or sleep.
    pub fn consume(&mut self) -> Consumed<T> {
        if self.done {
            return Consumed::Finished;
        }
        let h = unsafe { &*self.header };

        // The producer publishes `finished` only after its final tail
        // store, so once the flag is acquired a relaxed tail load is
        // enough to decide whether the stream is drained.
        if h.finished.load(Ordering::Acquire) != 0 && self.head == h.tail.load(Ordering::Relaxed) {
            self.done = true;
            return Consumed::Finished;
        }

        if self.head == self.cached_tail {
            self.cached_tail = h.tail.load(Ordering::Acquire);
            if self.head == self.cached_tail {
                return Consumed::Again;
            }
        }

        let item = unsafe { self.slots.add(self.head as usize).read() };
        self.head += 1;
        Consumed::Delivered(item)
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }
}
