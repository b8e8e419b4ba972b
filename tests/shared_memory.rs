// Segment manager tests. The kernel's shm namespaces are global, so the
// names and keys are salted with the test process id and the tests run
// serially.

#![cfg(target_os = "linux")]

use serial_test::serial;
use shm_spmc::shm::{PosixShm, SysvShm};
use shm_spmc::ShmError;

fn unique_name(tag: &str) -> String {
    format!("/shm_spmc_{}_{}", tag, std::process::id())
}

fn unique_key(salt: i32) -> i32 {
    0x5350_0000 | ((std::process::id() as i32 & 0xfff) << 4) | salt
}

#[test]
#[serial]
fn posix_create_then_attach() {
    let name = unique_name("create");
    let seg = PosixShm::create(&name, 4096).unwrap();
    assert_eq!(seg.len(), 4096);

    // fresh segments are zero-filled
    let bytes = unsafe { std::slice::from_raw_parts(seg.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));

    // publish a capacity word so attach can size the mapping from it
    unsafe { (seg.as_ptr() as *mut u64).write(7) };

    let (peer, capacity) = PosixShm::attach(&name, true, |cap| Ok(cap as usize * 8 + 8)).unwrap();
    assert_eq!(capacity, 7);
    assert_eq!(peer.len(), 64);
    let first = unsafe { (peer.as_ptr() as *const u64).read() };
    assert_eq!(first, 7);
}

#[test]
#[serial]
fn posix_create_is_exclusive() {
    let name = unique_name("excl");
    let _seg = PosixShm::create(&name, 4096).unwrap();

    let err = PosixShm::create(&name, 4096).err().expect("create must fail");
    match err {
        ShmError::SegmentExists(taken) => assert_eq!(taken, name),
        other => panic!("expected SegmentExists, got {other:?}"),
    }
}

#[test]
#[serial]
fn posix_attach_missing_segment() {
    let name = unique_name("missing");
    let err = PosixShm::attach(&name, true, |_| Ok(4096))
        .err()
        .expect("attach must fail");
    match err {
        ShmError::SegmentMissing(_) => {}
        other => panic!("expected SegmentMissing, got {other:?}"),
    }
}

#[test]
fn posix_zero_size_rejected() {
    let name = unique_name("zero");
    assert!(matches!(
        PosixShm::create(&name, 0),
        Err(ShmError::Size(_))
    ));
}

#[test]
#[serial]
fn posix_drop_unlinks_for_new_attachers() {
    let name = unique_name("unlink");
    {
        let _seg = PosixShm::create(&name, 4096).unwrap();
    }
    assert!(matches!(
        PosixShm::attach(&name, true, |_| Ok(4096)),
        Err(ShmError::SegmentMissing(_))
    ));
}

#[test]
#[serial]
fn posix_mapping_survives_creator_drop() {
    let name = unique_name("drain");
    let seg = PosixShm::create(&name, 4096).unwrap();
    unsafe { (seg.as_ptr() as *mut u64).write(1) };

    let (peer, _) = PosixShm::attach(&name, true, |_| Ok(4096)).unwrap();
    drop(seg);

    // the name is gone but the consumer's pages are not
    let first = unsafe { (peer.as_ptr() as *const u64).read() };
    assert_eq!(first, 1);
}

#[test]
#[serial]
fn sysv_create_attach_by_key_and_id() {
    let key = unique_key(1);
    let seg = SysvShm::create(key, 8192, false).unwrap();
    assert_eq!(seg.len(), 8192);
    unsafe { (seg.as_ptr() as *mut u64).write(0xfeed) };

    let by_key = SysvShm::attach_key(key).unwrap();
    assert_eq!(by_key.len(), 8192);
    assert_eq!(unsafe { (by_key.as_ptr() as *const u64).read() }, 0xfeed);

    let by_id = SysvShm::attach_id(seg.id()).unwrap();
    assert_eq!(unsafe { (by_id.as_ptr() as *const u64).read() }, 0xfeed);
}

#[test]
#[serial]
fn sysv_create_is_exclusive() {
    let key = unique_key(2);
    let _seg = SysvShm::create(key, 4096, false).unwrap();
    assert!(matches!(
        SysvShm::create(key, 4096, false),
        Err(ShmError::SegmentExists(_))
    ));
}

#[test]
#[serial]
fn sysv_drop_removes_key() {
    let key = unique_key(3);
    {
        let _seg = SysvShm::create(key, 4096, false).unwrap();
    }
    assert!(matches!(
        SysvShm::attach_key(key),
        Err(ShmError::SegmentMissing(_))
    ));
}
