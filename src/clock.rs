use std::time::{Instant, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;

/// Wall-clock epoch snapshot paired with a monotonic anchor, captured once.
/// Every timestamp after that is the anchor plus a monotonic delta, so
/// differences between `now_micros` readings are immune to system clock
/// adjustments while each reading stays interpretable as epoch time.
static ANCHOR: Lazy<(u64, Instant)> = Lazy::new(|| {
    let epoch_micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    (epoch_micros, Instant::now())
});

/// Current time in microseconds since the Unix epoch. Non-decreasing for the
/// lifetime of the process.
pub fn now_micros() -> u64 {
    let (epoch_micros, anchor) = *ANCHOR;
    epoch_micros + anchor.elapsed().as_micros() as u64
}
