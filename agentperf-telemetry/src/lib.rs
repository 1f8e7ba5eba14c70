//! Latency statistics and process resource sampling.
//!
//! [`stats::PercentileEngine`] reduces a latency list to summary statistics;
//! [`collector::MetricsCollector`] wraps it with a session lifecycle and
//! periodic resource snapshots taken through a [`collect::ResourceProbe`].

pub mod collect;
pub mod collector;
pub mod machine;
pub mod stats;

pub use collect::{ProbeError, ProcProbe, ResourceProbe, ResourceSample};
pub use collector::{CollectorError, CollectorState, MetricsCollector};
pub use machine::detect_machine_info;
pub use stats::PercentileEngine;
