pub mod derive;

pub use derive::{
    CalculatedMetrics, ConfidenceRange, StatusFlags, classify_confidence, derive_status_flags,
    derive_timings,
};
