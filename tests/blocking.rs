// Blocking-variant tests. Producer and consumer attach the same segment
// from threads of one process; the semaphores are process-shared either
// way.

#![cfg(target_os = "linux")]

use serial_test::serial;
use shm_spmc::spmc::blocking;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn unique_name(tag: &str) -> String {
    format!("/shm_spmc_blk_{}_{}", tag, std::process::id())
}

#[test]
#[serial]
fn round_trip_in_order() {
    let name = unique_name("rt");
    let mut producer = blocking::Producer::<u64>::create(&name, 4).unwrap();
    let mut consumer = blocking::Consumer::<u64>::attach(&name).unwrap();

    assert_eq!(producer.capacity(), 4);
    assert_eq!(consumer.capacity(), 4);

    for value in [11u64, 22, 33] {
        producer.produce(&value);
    }
    assert_eq!(producer.len(), 3);

    assert_eq!(consumer.consume(), 11);
    assert_eq!(consumer.consume(), 22);
    assert_eq!(consumer.consume(), 33);
    assert_eq!(consumer.len(), 0);
}

#[test]
#[serial]
fn wraps_around_the_ring() {
    let name = unique_name("wrap");
    let mut producer = blocking::Producer::<u32>::create(&name, 3).unwrap();
    let mut consumer = blocking::Consumer::<u32>::attach(&name).unwrap();

    // run more records through than the ring holds
    for round in 0..4u32 {
        for k in 0..3u32 {
            producer.produce(&(round * 3 + k));
        }
        for k in 0..3u32 {
            assert_eq!(consumer.consume(), round * 3 + k);
        }
    }
    assert!(consumer.is_empty());
}

#[test]
#[serial]
fn producer_blocks_at_capacity_until_one_consume() {
    let name = unique_name("block");
    let mut producer = blocking::Producer::<u64>::create(&name, 2).unwrap();
    let mut consumer = blocking::Consumer::<u64>::attach(&name).unwrap();

    producer.produce(&1);
    producer.produce(&2);
    assert_eq!(producer.len(), 2);

    let stored = Arc::new(AtomicBool::new(false));
    let handle = {
        let stored = Arc::clone(&stored);
        thread::spawn(move || {
            producer.produce(&3);
            stored.store(true, Ordering::SeqCst);
        })
    };

    // the third produce must be suspended in empty.wait
    thread::sleep(Duration::from_millis(100));
    assert!(!stored.load(Ordering::SeqCst));

    assert_eq!(consumer.consume(), 1);
    handle.join().unwrap();
    assert!(stored.load(Ordering::SeqCst));

    assert_eq!(consumer.consume(), 2);
    assert_eq!(consumer.consume(), 3);
}

#[test]
#[serial]
fn consumer_blocks_until_produce() {
    let name = unique_name("empty");
    let mut producer = blocking::Producer::<u64>::create(&name, 2).unwrap();
    let mut consumer = blocking::Consumer::<u64>::attach(&name).unwrap();

    let handle = thread::spawn(move || consumer.consume());
    thread::sleep(Duration::from_millis(50));
    producer.produce(&77);

    assert_eq!(handle.join().unwrap(), 77);
}

#[test]
#[serial]
fn keyed_round_trip() {
    let key = 0x424b_0000 | (std::process::id() as i32 & 0xffff);
    let mut producer = blocking::Producer::<u64>::create_keyed(key, 4, false).unwrap();
    let mut consumer = blocking::Consumer::<u64>::attach_key(key).unwrap();

    producer.produce(&42);
    assert_eq!(consumer.consume(), 42);
    assert_eq!(consumer.capacity(), 4);
}
