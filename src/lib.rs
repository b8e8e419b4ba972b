//! Single-producer multiple-consumer bounded ring buffers backed by shared
//! memory, for low-latency inter-process handoff of fixed-size records.
//!
//! Three variants share the produce/consume/capacity contract but differ in
//! synchronisation strategy: a semaphore-synchronised circular buffer
//! ([`spmc::blocking`]), a lock-free buffer indexed by a shared monotonic
//! tail ([`spmc::shared_tail`]), and a lock-free buffer with one "produced"
//! flag per slot ([`spmc::slot_flag`]). A segment has exactly one producer
//! and any number of consumers; every consumer reads the full stream from
//! its own private cursor.

pub mod error;
pub mod kline;
pub mod shm;
pub mod spmc;

pub use error::{Full, ShmError};
pub use spmc::Consumed;
