//! Device sessions and the registry guarding them

pub mod registry;
pub mod session;

pub use registry::DeviceRegistry;
pub use session::{ConnectOutcome, ConnectionState, DeviceSession, SessionContext};
