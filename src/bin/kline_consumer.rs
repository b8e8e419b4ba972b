// Kline stream consumer: drains a per-slot-flag ring, keeps per-symbol
// aggregates with a running median of closes, and writes one CSV row per
// symbol once the producer finishes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use std::thread;
use std::time::Duration;

use shm_spmc::kline::Kline;
use shm_spmc::spmc::slot_flag;
use shm_spmc::Consumed;

const PRINT_EVERY: i32 = 1_000_000; // every 10 simulated minutes

/// Running median over an append-only stream, kept as two balanced heaps:
/// `low` holds the smaller half (max at top), `high` the larger half
/// (min at top).
#[derive(Default)]
struct RunningMedian {
    low: BinaryHeap<i32>,
    high: BinaryHeap<Reverse<i32>>,
}

impl RunningMedian {
    fn insert(&mut self, x: i32) {
        match self.low.peek() {
            Some(&top) if x > top => self.high.push(Reverse(x)),
            _ => self.low.push(x),
        }

        if self.low.len() > self.high.len() + 1 {
            if let Some(top) = self.low.pop() {
                self.high.push(Reverse(top));
            }
        } else if self.high.len() > self.low.len() {
            if let Some(Reverse(top)) = self.high.pop() {
                self.low.push(top);
            }
        }
    }

    fn median(&self) -> i32 {
        let low_top = self.low.peek().copied().unwrap_or(0);
        if self.low.len() == self.high.len() {
            let high_top = self.high.peek().map_or(0, |r| r.0);
            (low_top + high_top) / 2
        } else {
            low_top
        }
    }
}

#[derive(Default)]
struct SymbolStat {
    vol: u64,
    num_trades: u64,
    closes: RunningMedian,
    factor: i32,
}

fn update_factor(stat: &mut HashMap<u32, SymbolStat>, kline: &Kline) {
    let data = stat.entry(kline.sym_id).or_default();
    data.vol += kline.volume as u64;
    data.num_trades += kline.num_trades as u64;

    let typical_price = (kline.high + kline.low + kline.close) / 3;
    data.closes.insert(kline.close);
    let median = data.closes.median();
    data.factor += if typical_price < median { 1 } else { -1 };
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <shm_name> <out_file>", args[0]);
        process::exit(1);
    }
    let shm_name = &args[1];
    let out_file = &args[2];

    let mut buffer = slot_flag::Consumer::<Kline>::attach(shm_name).unwrap_or_else(|e| {
        eprintln!("failed to attach to segment {shm_name}: {e}");
        process::exit(1);
    });

    let mut stat: HashMap<u32, SymbolStat> = HashMap::new();
    let mut print_at = 93_000_000;

    loop {
        match buffer.consume() {
            Consumed::Delivered(kline) => {
                if kline.time >= print_at {
                    println!("consumer current timepoint: {}", kline.time);
                    print_at = kline.time + PRINT_EVERY;
                }
                update_factor(&mut stat, &kline);
            }
            Consumed::Again => {
                thread::sleep(Duration::from_millis(1));
            }
            Consumed::Finished => break,
        }
    }

    let out = File::create(out_file).unwrap_or_else(|e| {
        eprintln!("failed to create {out_file}: {e}");
        process::exit(1);
    });
    let mut ofs = BufWriter::new(out);

    if let Err(e) = write_stats(&mut ofs, &stat) {
        eprintln!("failed to write {out_file}: {e}");
        process::exit(1);
    }
}

fn write_stats(out: &mut impl Write, stat: &HashMap<u32, SymbolStat>) -> std::io::Result<()> {
    writeln!(out, "sym_id,vol,num_trades,factor")?;
    for (sym_id, data) in stat {
        writeln!(
            out,
            "{},{},{},{}",
            sym_id, data.vol, data.num_trades, data.factor
        )?;
    }
    Ok(())
}
