//! Configuration helpers shared by the agentperf binaries.
//!
//! Only environment parsing lives here; the pipeline's own settings file is
//! owned by the `agentperf` crate.

pub mod env;

pub use env::{ENV_PREFIX, EnvError, EnvParser};
