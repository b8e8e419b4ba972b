// Semaphore-synchronised circular buffer, the classical Dijkstra
// producer-consumer arrangement: a binary `mutex` semaphore protects
// `head`/`len`, a counting `full` semaphore counts readable slots, a
// counting `empty` semaphore counts writable slots. In quiescent state
// `empty + full == cap`.
//
// Lock ordering: the resource semaphore (`full` or `empty`) is always
// acquired before the mutex, and the mutex is released before the
// opposite resource semaphore is posted.

use std::marker::PhantomData;
use std::ptr::{self, addr_of_mut};

use bytemuck::Pod;

use crate::error::ShmError;
use crate::shm::{sem, PosixShm, Segment, SysvShm};

use super::layout::{self, BlockingHeader};

/// The writing side. Creating it creates the segment; dropping it removes
/// the name or key so no new consumer can attach.
pub struct Producer<T> {
    _seg: Box<dyn Segment>,
    header: *mut BlockingHeader,
    slots: *mut T,
    _marker: PhantomData<T>,
}

/// A reading side. Any number may attach; each advances the shared head
/// under the mutex, so a record is consumed by exactly one of them.
pub struct Consumer<T> {
    _seg: Box<dyn Segment>,
    header: *mut BlockingHeader,
    slots: *mut T,
    _marker: PhantomData<T>,
}

unsafe impl<T: Pod> Send for Producer<T> {}
unsafe impl<T: Pod> Send for Consumer<T> {}

impl<T: Pod> Producer<T> {
    /// Create a name-addressed (POSIX) buffer for `capacity` records.
    pub fn create(name: &str, capacity: u64) -> Result<Self, ShmError> {
        check_sem_capacity(capacity)?;
        let bytes = layout::blocking_bytes::<T>(capacity)?;
        let seg = PosixShm::create(name, bytes)?;
        unsafe { Self::init(Box::new(seg), capacity) }
    }

    /// Create a key-addressed (System V) buffer for `capacity` records,
    /// optionally backed by huge pages.
    pub fn create_keyed(key: i32, capacity: u64, huge_pages: bool) -> Result<Self, ShmError> {
        check_sem_capacity(capacity)?;
        let bytes = layout::blocking_bytes::<T>(capacity)?;
        let seg = SysvShm::create(key, bytes, huge_pages)?;
        unsafe { Self::init(Box::new(seg), capacity) }
    }

    /// # Safety
    /// `seg` must be a fresh zero-filled mapping sized by
    /// `layout::blocking_bytes::<T>(capacity)` that no other process has
    /// attached yet.
    unsafe fn init(seg: Box<dyn Segment>, capacity: u64) -> Result<Self, ShmError> {
        let header = seg.as_ptr() as *mut BlockingHeader;
        addr_of_mut!((*header).cap).write(capacity);
        addr_of_mut!((*header).head).write(0);
        addr_of_mut!((*header).len).write(0);
        sem::init(addr_of_mut!((*header).mutex), 1)?;
        sem::init(addr_of_mut!((*header).full), 0)?;
        sem::init(addr_of_mut!((*header).empty), capacity as u32)?;

        let slots = seg.as_ptr().add(layout::blocking_slots_offset::<T>()) as *mut T;
        Ok(Self {
            _seg: seg,
            header,
            slots,
            _marker: PhantomData,
        })
    }

    /// Append `item` at the ring tail, blocking while the ring is full.
    pub fn produce(&mut self, item: &T) {
        let h = self.header;
        unsafe {
            sem::wait(addr_of_mut!((*h).empty));
            sem::wait(addr_of_mut!((*h).mutex));

            let tail = ((*h).head + (*h).len) % (*h).cap;
            self.slots.add(tail as usize).write(*item);
            (*h).len += 1;

            sem::post(addr_of_mut!((*h).mutex));
            sem::post(addr_of_mut!((*h).full));
        }
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }

    /// Records currently buffered. Unsynchronised observational read; the
    /// value may be stale by the time it is returned.
    pub fn len(&self) -> u64 {
        unsafe { ptr::read_volatile(ptr::addr_of!((*self.header).len)) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Pod> Consumer<T> {
    /// Attach to a name-addressed buffer; the capacity is discovered from
    /// the segment header.
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        let (seg, _) = PosixShm::attach(name, false, |cap| layout::blocking_bytes::<T>(cap))?;
        Ok(Self::open(Box::new(seg)))
    }

    /// Attach to a key-addressed buffer.
    pub fn attach_key(key: i32) -> Result<Self, ShmError> {
        Self::open_sysv(SysvShm::attach_key(key)?)
    }

    /// Attach to a key-addressed buffer by its numeric segment id.
    pub fn attach_id(id: i32) -> Result<Self, ShmError> {
        Self::open_sysv(SysvShm::attach_id(id)?)
    }

    fn open_sysv(seg: SysvShm) -> Result<Self, ShmError> {
        let capacity = unsafe { ptr::read_volatile(seg.as_ptr() as *const u64) };
        let expected = layout::blocking_bytes::<T>(capacity)?;
        if seg.len() < expected {
            return Err(ShmError::Size(format!(
                "segment holds {} bytes, {} slots of this record need {expected}",
                seg.len(),
                capacity
            )));
        }
        Ok(Self::open(Box::new(seg)))
    }

    fn open(seg: Box<dyn Segment>) -> Self {
        let header = seg.as_ptr() as *mut BlockingHeader;
        let slots = unsafe { seg.as_ptr().add(layout::blocking_slots_offset::<T>()) } as *mut T;
        Self {
            _seg: seg,
            header,
            slots,
            _marker: PhantomData,
        }
    }

    /// Take the record at the ring head, blocking while the ring is empty.
    pub fn consume(&mut self) -> T {
        let h = self.header;
        unsafe {
            sem::wait(addr_of_mut!((*h).full));
            sem::wait(addr_of_mut!((*h).mutex));

            let item = self.slots.add((*h).head as usize).read();
            (*h).head = ((*h).head + 1) % (*h).cap;
            (*h).len -= 1;

            sem::post(addr_of_mut!((*h).mutex));
            sem::post(addr_of_mut!((*h).empty));
            item
        }
    }

    pub fn capacity(&self) -> u64 {
        unsafe { (*self.header).cap }
    }

    /// Records currently buffered. Unsynchronised observational read.
    pub fn len(&self) -> u64 {
        unsafe { ptr::read_volatile(ptr::addr_of!((*self.header).len)) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The `empty` semaphore starts at `capacity`, so the capacity must fit a
/// semaphore counter.
fn check_sem_capacity(capacity: u64) -> Result<(), ShmError> {
    if capacity > u32::MAX as u64 {
        return Err(ShmError::Size(format!(
            "capacity {capacity} exceeds the semaphore counter range"
        )));
    }
    Ok(())
}
