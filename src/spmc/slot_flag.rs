// Lock-free buffer with one "produced" flag per slot, after Giacomoni's
// FastForward queue. Producer and consumer cursors are process-local, so
// the only cross-core communication per record is the slot itself and its
// flag byte; unlike the shared-tail variant there is no index cache line
// bouncing between cores while head and tail are far apart.
//
// Same single-pass lifecycle as the shared-tail variant: cursors run over
// `[0, cap]` and a full buffer is terminal.

use std::marker::PhantomData;
use std::sync::atomic::{fence, AtomicU8, Ordering};

use bytemuck::Pod;
use crossbeam_utils::CachePadded;

use crate::error::{Full, ShmError};
use crate::shm::PosixShm;

use super::layout::{self, SlotFlagHeader};
use super::Consumed;

/// The writing side. Dropping it publishes end-of-stream and unlinks the
/// segment name.
pub struct Producer<T> {
    _seg: PosixShm,
    header: *mut SlotFlagHeader,
    flags: *const AtomicU8,
    slots: *mut T,
    /// Local publish cursor, padded so a consumer thread in the same
    /// process cannot false-share with it.
    tail: CachePadded<u64>,
    _marker: PhantomData<T>,
}

/// A reading side with a private cursor.
pub struct Consumer<T> {
    _seg: PosixShm,
    header: *const SlotFlagHeader,
    flags: *const AtomicU8,
    slots: *const T,
    head: CachePadded<u64>,
    done: bool,
    _marker: PhantomData<T>,
}

unsafe impl<T: Pod> Send for Producer<T> {}
unsafe impl<T: Pod> Send for Consumer<T> {}

impl<T: Pod> Producer<T> {
    /// Create the segment under `name`, sized for `capacity` records plus
    /// one flag byte per slot.
    pub fn create(name: &str, capacity: u64) -> Result<Self, ShmError> {
        let bytes = layout::slot_flag_bytes::<T>(capacity)?;
        let slots_offset = layout::slot_flag_slots_offset::<T>(capacity)?;
        let seg = PosixShm::create(name, bytes)?;

        let header = seg.as_ptr() as *mut SlotFlagHeader;
        // flags and finished start at zero from the fresh mapping
        unsafe { std::ptr::addr_of_mut!((*header).cap).write(capacity) };
        let flags =
            unsafe { seg.as_ptr().add(layout::slot_flag_flags_offset()) } as *const AtomicU8;
        let slots = unsafe { seg.as_ptr().add(slots_offset) } as *mut T;

        Ok(Self {
            _seg: seg,
            header,
            flags,
            slots,
            tail: CachePadded::new(0),
            _marker: PhantomData,
        })
    }

    /// Publish `item` into the next slot: slot bytes first, then the
    /// release store on the slot's flag, then the local cursor bump.
    pub fn produce(&mut self, item: &T) -> Result<(), Full> {
        if *self.tail == self.capacity() {
            return Err(Full);
        }
        let at = *self.tail as usize;
        unsafe {
            self.slots.add(at).write(*item);
            (*self.flags.add(at)).store(1, Ordering::Release);
        }
        *self.tail += 1;
        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        // Publish end-of-stream before the segment drop unlinks the name.
        unsafe { (*self.header).finished.store(1, Ordering::Release) };
        fence(Ordering::SeqCst);
    }
}

impl<T: Pod> Consumer<T> {
    /// Attach read-only to an existing segment; the capacity is discovered
    /// from the segment header.
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        let (seg, capacity) =
            PosixShm::attach(name, true, |cap| layout::slot_flag_bytes::<T>(cap))?;
        let slots_offset = layout::slot_flag_slots_offset::<T>(capacity)?;

        let header = seg.as_ptr() as *const SlotFlagHeader;
        let flags =
            unsafe { seg.as_ptr().add(layout::slot_flag_flags_offset()) } as *const AtomicU8;
        let slots = unsafe { seg.as_ptr().add(slots_offset) } as *const T;

        Ok(Self {
            _seg: seg,
            header,
            flags,
            slots,
            head: CachePadded::new(0),
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
        let head = *self.head;

        if head == h.cap {
            // Every slot consumed; the stream ends when the producer says so.
            if h.finished.load(Ordering::Acquire) != 0 {
                self.done = true;
                return Consumed::Finished;
            }
            return Consumed::Again;
        }

        if h.finished.load(Ordering::Acquire) != 0 {
            // The acquire on `finished` ordered every earlier flag and slot
            // store; a still-unset flag can never be set again.
            if unsafe { (*self.flags.add(head as usize)).load(Ordering::Relaxed) } == 0 {
                self.done = true;
                return Consumed::Finished;
            }
            return self.deliver(head);
        }

        if unsafe { (*self.flags.add(head as usize)).load(Ordering::Acquire) } == 0 {
            return Consumed::Again;
        }
        self.deliver(head)
    }

    fn deliver(&mut self, head: u64) -> Consumed<T> {
        let item = unsafe { self.slots.add(head as usize).read() };
        *self.head = head + 1;
        Consumed::Delivered(item)
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }
}
