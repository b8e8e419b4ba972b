// Layout conformance tests for the cross-process contract.
// These assert the sizes and field offsets that producer and consumer
// processes must agree on, and print the observed values to aid debugging
// when a mismatch occurs on a given platform.

use memoffset::offset_of;
use shm_spmc::kline::Kline;
use shm_spmc::spmc::layout::{
    self, BlockingHeader, SharedTailHeader, SlotFlagHeader, CACHE_LINE,
};
use std::mem::{align_of, size_of};

#[test]
fn kline_record_layout() {
    let size = size_of::<Kline>();
    let align = align_of::<Kline>();
    println!("Kline => size: {size}, align: {align}");

    assert_eq!(size, 32);
    assert_eq!(align, 4);
    assert_eq!(offset_of!(Kline, sym_id), 0);
    assert_eq!(offset_of!(Kline, time), 4);
    assert_eq!(offset_of!(Kline, volume), 8);
    assert_eq!(offset_of!(Kline, num_trades), 12);
    assert_eq!(offset_of!(Kline, open), 16);
    assert_eq!(offset_of!(Kline, close), 20);
    assert_eq!(offset_of!(Kline, high), 24);
    assert_eq!(offset_of!(Kline, low), 28);
}

#[test]
fn slot_flag_header_is_bit_exact() {
    // capacity at 0, finished byte at 8, flag bytes at 64, slot array
    // padded up to the record alignment
    assert_eq!(offset_of!(SlotFlagHeader, cap), 0);
    assert_eq!(offset_of!(SlotFlagHeader, finished), 8);
    assert_eq!(size_of::<SlotFlagHeader>(), CACHE_LINE);
    assert_eq!(layout::slot_flag_flags_offset(), 64);

    // 64 + 5 flag bytes = 69, rounded up to Kline's 4-byte alignment
    assert_eq!(layout::slot_flag_slots_offset::<Kline>(5).unwrap(), 72);
    assert_eq!(
        layout::slot_flag_bytes::<Kline>(5).unwrap(),
        72 + 5 * size_of::<Kline>()
    );
}

#[test]
fn shared_tail_header_isolates_hot_fields() {
    assert_eq!(offset_of!(SharedTailHeader, cap), 0);
    assert_eq!(offset_of!(SharedTailHeader, finished), CACHE_LINE);
    assert_eq!(offset_of!(SharedTailHeader, tail), 2 * CACHE_LINE);
    assert_eq!(size_of::<SharedTailHeader>(), 3 * CACHE_LINE);

    assert_eq!(layout::shared_tail_slots_offset::<u64>(), 3 * CACHE_LINE);
    assert_eq!(
        layout::shared_tail_bytes::<u64>(4).unwrap(),
        3 * CACHE_LINE + 4 * size_of::<u64>()
    );
}

#[test]
fn blocking_header_leads_with_capacity() {
    let sem = size_of::<libc::sem_t>();
    println!("sem_t => size: {sem}");

    // capacity must be the first word so consumers can size the mapping
    assert_eq!(offset_of!(BlockingHeader, cap), 0);
    assert_eq!(offset_of!(BlockingHeader, head), 8);
    assert_eq!(offset_of!(BlockingHeader, len), 16);
    assert_eq!(offset_of!(BlockingHeader, mutex), 24);
    assert_eq!(offset_of!(BlockingHeader, full), 24 + sem);
    assert_eq!(offset_of!(BlockingHeader, empty), 24 + 2 * sem);
}

#[test]
fn slot_array_is_naturally_aligned() {
    #[repr(C, align(16))]
    #[derive(Clone, Copy)]
    struct Wide {
        _data: [u8; 48],
    }

    let offset = layout::slot_flag_slots_offset::<Wide>(3).unwrap();
    assert_eq!(offset % align_of::<Wide>(), 0);

    let offset = layout::shared_tail_slots_offset::<Wide>();
    assert_eq!(offset % align_of::<Wide>(), 0);

    let offset = layout::blocking_slots_offset::<Wide>();
    assert_eq!(offset % align_of::<Wide>(), 0);
}

#[test]
fn oversized_capacities_are_rejected() {
    assert!(layout::slot_flag_bytes::<Kline>(0).is_err());
    assert!(layout::shared_tail_bytes::<Kline>(0).is_err());
    assert!(layout::blocking_bytes::<Kline>(0).is_err());
    assert!(layout::slot_flag_bytes::<Kline>(u64::MAX).is_err());
    assert!(layout::shared_tail_bytes::<u64>(u64::MAX / 2).is_err());
}
