// Byte layout of the shared segments.
//
// Every header variant stores the slot capacity in its first eight bytes,
// so a consumer can size the full mapping knowing only the segment name.
// All headers are `#[repr(C)]` with explicit padding fields; the slot
// array is padded up to `align_of::<T>()` rather than relying on implicit
// struct padding, because the offsets are a cross-process contract.

use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicU64, AtomicU8};

use crate::error::ShmError;

pub const CACHE_LINE: usize = 64;

/// Control block of the semaphore-synchronised variant.
///
/// `head` and `len` are plain words only ever touched under `mutex`; the
/// counting semaphores `full` and `empty` carry the flow control. Both
/// roles map the segment read-write.
#[repr(C)]
pub struct BlockingHeader {
    pub cap: u64,
    pub head: u64,
    pub len: u64,
    pub mutex: libc::sem_t,
    pub full: libc::sem_t,
    pub empty: libc::sem_t,
}

/// Header of the shared-tail variant.
///
/// `tail` and `finished` each own a cache line so the producer's index
/// updates never contend with consumers polling for end-of-stream. `cap`
/// is written once at create time and read-only thereafter.
#[repr(C)]
pub struct SharedTailHeader {
    pub cap: u64,
    pub _pad0: [u8; CACHE_LINE - 8],
    pub finished: AtomicU8,
    pub _pad1: [u8; CACHE_LINE - 1],
    pub tail: AtomicU64,
    pub _pad2: [u8; CACHE_LINE - 8],
}

/// Header of the per-slot-flag variant, bit-exact on little-endian 64-bit
/// hosts: capacity at offset 0, finished byte at offset 8, one produced
/// flag byte per slot starting at offset 64, then the slot array padded up
/// to the record alignment.
#[repr(C)]
pub struct SlotFlagHeader {
    pub cap: u64,
    pub finished: AtomicU8,
    pub _pad: [u8; CACHE_LINE - 9],
}

const _: () = assert!(size_of::<SharedTailHeader>() == 3 * CACHE_LINE);
const _: () = assert!(size_of::<SlotFlagHeader>() == CACHE_LINE);

pub fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Reject capacities no variant can represent.
pub fn check_capacity(capacity: u64) -> Result<(), ShmError> {
    if capacity == 0 {
        return Err(ShmError::Size("capacity must be non-zero".to_owned()));
    }
    Ok(())
}

fn slots_bytes<T>(capacity: u64) -> Result<usize, ShmError> {
    let cap = usize::try_from(capacity)
        .map_err(|_| ShmError::Size(format!("capacity {capacity} exceeds the address space")))?;
    cap.checked_mul(size_of::<T>())
        .ok_or_else(|| ShmError::Size(format!("{cap} slots of {} bytes overflow", size_of::<T>())))
}

fn total_bytes<T>(slots_offset: usize, capacity: u64) -> Result<usize, ShmError> {
    slots_offset
        .checked_add(slots_bytes::<T>(capacity)?)
        .ok_or_else(|| ShmError::Size(format!("segment for {capacity} slots overflows")))
}

pub fn blocking_slots_offset<T>() -> usize {
    align_up(size_of::<BlockingHeader>(), align_of::<T>())
}

pub fn blocking_bytes<T>(capacity: u64) -> Result<usize, ShmError> {
    check_capacity(capacity)?;
    total_bytes::<T>(blocking_slots_offset::<T>(), capacity)
}

pub fn shared_tail_slots_offset<T>() -> usize {
    align_up(size_of::<SharedTailHeader>(), align_of::<T>())
}

pub fn shared_tail_bytes<T>(capacity: u64) -> Result<usize, ShmError> {
    check_capacity(capacity)?;
    total_bytes::<T>(shared_tail_slots_offset::<T>(), capacity)
}

/// Offset of the produced-flag array: the first byte after the header.
pub fn slot_flag_flags_offset() -> usize {
    size_of::<SlotFlagHeader>()
}

pub fn slot_flag_slots_offset<T>(capacity: u64) -> Result<usize, ShmError> {
    let cap = usize::try_from(capacity)
        .map_err(|_| ShmError::Size(format!("capacity {capacity} exceeds the address space")))?;
    let flags_end = slot_flag_flags_offset()
        .checked_add(cap)
        .ok_or_else(|| ShmError::Size(format!("flag array for {cap} slots overflows")))?;
    Ok(align_up(flags_end, align_of::<T>()))
}

pub fn slot_flag_bytes<T>(capacity: u64) -> Result<usize, ShmError> {
    check_capacity(capacity)?;
    total_bytes::<T>(slot_flag_slots_offset::<T>(capacity)?, capacity)
}
