// Synthetic kline producer: streams one trading day of records for
// `sym_cnt` symbols into a per-slot-flag ring at `shm_name`. The RNG is
// seeded so repeated runs publish the identical byte sequence.

use std::env;
use std::mem::size_of;
use std::process;

use shm_spmc::kline::Kline;
use shm_spmc::spmc::slot_flag;

const GB: f64 = (1024 * 1024 * 1024) as f64;

/// Session timestamps are HHMMSSmmm integers: 09:30:00.000 to 16:00:00.000
/// in 3-second steps, rolling the minute field over at 60.
const DAY_START: i32 = 93_000_000;
const DAY_END: i32 = 160_000_000;
const STEP: i32 = 3_000;
const PRINT_EVERY: i32 = 1_000_000; // every 10 simulated minutes
const MINUTE_ROLLOVER: i32 = 4_000_000; // xx:60 -> next hour

fn fill_data(sym: i32, time: i32) -> Kline {
    let r = fastrand::i32(0..=20);
    Kline {
        sym_id: sym as u32,
        time,
        volume: (sym + r) as u32,
        num_trades: r as u32,
        open: sym + (r & 5),
        close: sym + (r & 3),
        high: sym + (r & 13),
        low: sym - (r & 7),
    }
}

fn produce_day(buffer: &mut slot_flag::Producer<Kline>, sym_cnt: i32) {
    fastrand::seed(12345); // reproducible stream
    let mut print_at = DAY_START;
    let mut t = DAY_START;

    while t <= DAY_END {
        if t / 100_000 % 100 >= 60 {
            t += MINUTE_ROLLOVER;
            print_at += MINUTE_ROLLOVER;
            continue;
        }
        if t >= print_at {
            println!("producer current timepoint: {t}");
            print_at += PRINT_EVERY;
        }

        for sym in 1..=sym_cnt {
            let data = fill_data(sym, t);
            if buffer.produce(&data).is_err() {
                println!("failed to produce data: max size reached");
                return;
            }
        }

        t += STEP;
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <shm_name> <size_gb> <sym_cnt>", args[0]);
        process::exit(1);
    }

    let shm_name = &args[1];
    let size_gb: f64 = args[2].parse().unwrap_or_else(|_| {
        eprintln!("invalid size_gb `{}`", args[2]);
        process::exit(1);
    });
    let sym_cnt: i32 = args[3].parse().unwrap_or_else(|_| {
        eprintln!("invalid sym_cnt `{}`", args[3]);
        process::exit(1);
    });
    println!("shm_name: {shm_name}\nsym_cnt: {sym_cnt}");

    // The ring is single-pass: size it for the whole session up front.
    let capacity = (size_gb * GB) as u64 / size_of::<Kline>() as u64;
    let mut buffer = slot_flag::Producer::<Kline>::create(shm_name, capacity).unwrap_or_else(|e| {
        eprintln!("failed to create segment {shm_name}: {e}");
        process::exit(1);
    });

    produce_day(&mut buffer, sym_cnt);
}
