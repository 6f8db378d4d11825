/// Data whose non-zero ratio falls below this is handled with sparse sorted indexes.
pub const NONZERO_RATIO_THRESHOLD: f64 = 0.4;
/// Data with more entries than this is handled with sparse sorted indexes.
pub const MAX_DENSE_ENTRIES: usize = 16 * 1024 * 1024;
/// Written first in every binary model, used by readers to detect byte order.
pub const BYTE_ORDER_MARK: u32 = 0x0102_0304;
/// Marker, root id, node count.
pub const MODEL_HEADER_SIZE: usize = 12;
/// feature:i32, threshold:f64, left:i32, right:i32, parent:i32, weight:f64
pub const NODE_RECORD_SIZE: usize = 32;
/// Gain recorded on splits that are replayed from an existing tree.
pub const REPLAYED_SPLIT_GAIN: f64 = 1.0;
/// Minimum gain a reference scorer split must reach.
pub const MIN_SPLIT_GAIN: f64 = 1e-12;
