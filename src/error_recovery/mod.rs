//! Recovery from lost device connections
//!
//! Bounded, backed-off reconnects for devices that drop their link.

pub mod retry_policy;
pub mod supervisor;

pub use retry_policy::ReconnectPolicy;
pub use supervisor::{ReconnectStats, ReconnectSupervisor};
