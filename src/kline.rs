// Sample kline (OHLCV candle) record used by the driver programs and the
// round-trip tests. The buffers themselves are generic over any `Pod`
// record and do not depend on this type.

use bytemuck::{Pod, Zeroable};

/// One fixed-point kline record: 32 bytes, no padding, safe to copy byte
/// for byte across address spaces.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Kline {
    pub sym_id: u32,
    /// Timestamp encoded as HHMMSSmmm, e.g. 93000000 for 09:30:00.000.
    pub time: i32,
    pub volume: u32,
    pub num_trades: u32,
    pub open: i32,
    pub close: i32,
    pub high: i32,
    pub low: i32,
}
