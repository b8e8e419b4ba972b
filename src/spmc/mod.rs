// The three SPMC ring buffer variants. Each is parameterised by a
// fixed-size record type `T: bytemuck::Pod`; record bytes cross the
// process boundary as a plain byte copy, so owning pointers are rejected
// by the Pod bound at compile time.
//
// Portability: both lock-free variants rely on atomic loads and stores on
// memory mapped into several address spaces at once. This is sound on the
// commodity targets this crate supports (x86_64 and aarch64 Linux, where
// cache coherency operates on physical addresses), and is not expected to
// hold on exotic hardware without coherent caches.

pub mod blocking;
pub mod layout;
pub mod shared_tail;
pub mod slot_flag;

/// Outcome of one lock-free consume call.
///
/// `Again` and `Finished` are control-flow signals, not errors: `Again`
/// means nothing is published past this consumer's cursor yet, `Finished`
/// means the producer has closed and every published record was drained.
/// Once a consumer has returned `Finished`, every later call does too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed<T> {
    /// The next record in production order.
    Delivered(T),
    /// No new record available; callers busy-wait or back off.
    Again,
    /// End of stream.
    Finished,
}
