//! Subprobe - subscription aggregator and reachability prober
//!
//! Collects proxy endpoint descriptors from remote subscription sources,
//! checks which ones accept TCP connections, ranks them by latency, tags
//! them with a country and writes grouped subscription files.

pub mod pipeline;
pub mod proxy;
pub mod settings;

pub use pipeline::{Pipeline, RunSummary};
pub use proxy::*;
pub use settings::{Settings, SourceList};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
