//! isobridge core — transport-agnostic pieces of the workspace isolation bridge.
//!
//! This library holds everything the stdio relay needs that does not touch a
//! process or a stream: the configuration schema and loader, the host path
//! rewriter applied to client→backend messages, the best-effort activity
//! sink, and the lock-free relay statistics.

pub mod activity;
pub mod config;
pub mod paths;
pub mod stats;
