//! The bridge: one supervised backend relayed to one stdio client.
//!
//! - `supervisor`: spawning, liveness and termination of the backend
//! - `relay`: the three pumps, the health monitor and the session controller
//! - `session` / `lifecycle`: session state machine and shutdown bookkeeping

pub mod lifecycle;
pub mod relay;
pub mod session;
pub mod signals;
pub mod supervisor;

pub use lifecycle::{BackendExit, BridgeState, ShutdownReason, ShutdownRequest, StreamDirection};
pub use relay::{BridgeOptions, run_bridge};
pub use session::BridgeSession;
pub use supervisor::{Backend, BackendControl, BackendHandle, BackendSpec, ProcessSupervisor};
