//! Per-client stdio bridge to a dedicated, supervised MCP backend.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod logging;
