pub mod error;
pub mod probe;
pub mod result;

pub use error::{ProbeError, TransportStage};
pub use probe::{ProbeRequest, run_probe};
pub use result::RawMetrics;
