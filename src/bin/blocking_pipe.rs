// Interactive driver for the blocking variant: the producer forwards
// integers from stdin into the ring, the consumer prints what it drains.
// A leading `/` on the segment id selects the POSIX backend, a bare
// integer the System V backend (optionally huge-page backed).

use std::env;
use std::io::{self, BufRead};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shm_spmc::spmc::blocking;

fn usage(app: &str) -> ! {
    eprintln!(
        "Usage:\n\
         {app} producer </name|key> <capacity> [--huge]\n\
         {app} consumer </name|key>"
    );
    process::exit(1);
}

fn run_producer(id: &str, capacity: u64, huge_pages: bool) {
    let mut buffer = open_producer(id, capacity, huge_pages).unwrap_or_else(|e| {
        eprintln!("failed to create segment {id}: {e}");
        process::exit(1);
    });

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            eprintln!("failed to install SIGINT handler: {e}");
            process::exit(1);
        }
    }

    for line in io::stdin().lock().lines() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let item: i64 = match line.trim().parse() {
            Ok(item) => item,
            Err(_) => continue,
        };
        buffer.produce(&item);
        println!("Produced: {item}");
    }
}

fn run_consumer(id: &str) {
    let mut buffer = open_consumer(id).unwrap_or_else(|e| {
        eprintln!("failed to attach to segment {id}: {e}");
        process::exit(1);
    });

    loop {
        let item = buffer.consume();
        println!("Consumed: {item}");
    }
}

fn open_producer(
    id: &str,
    capacity: u64,
    huge_pages: bool,
) -> Result<blocking::Producer<i64>, shm_spmc::ShmError> {
    if id.starts_with('/') {
        blocking::Producer::create(id, capacity)
    } else {
        let key: i32 = id.parse().unwrap_or_else(|_| {
            eprintln!("segment id `{id}` is neither a /name nor a numeric key");
            process::exit(1);
        });
        blocking::Producer::create_keyed(key, capacity, huge_pages)
    }
}

fn open_consumer(id: &str) -> Result<blocking::Consumer<i64>, shm_spmc::ShmError> {
    if id.starts_with('/') {
        blocking::Consumer::attach(id)
    } else {
        let key: i32 = id.parse().unwrap_or_else(|_| {
            eprintln!("segment id `{id}` is neither a /name nor a numeric key");
            process::exit(1);
        });
        blocking::Consumer::attach_key(key)
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }

    match args[1].as_str() {
        "producer" => {
            if args.len() < 4 {
                usage(&args[0]);
            }
            let capacity: u64 = args[3].parse().unwrap_or_else(|_| {
                eprintln!("invalid capacity `{}`", args[3]);
                process::exit(1);
            });
            if capacity == 0 {
                eprintln!("invalid capacity");
                process::exit(1);
            }
            let huge_pages = args.iter().any(|a| a == "--huge");
            run_producer(&args[2], capacity, huge_pages);
        }
        "consumer" => run_consumer(&args[2]),
        _ => usage(&args[0]),
    }
}
