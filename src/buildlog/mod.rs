//! Metric extraction from free-text Yocto/OpenEmbedded build logs.

mod classify;
mod metrics;

pub use classify::{Phase, IDENTITY_KEYS};
pub use metrics::{extract_from_file, LogMetrics, CAPRICA, NUM_OF_FROM_SCRATCH};
