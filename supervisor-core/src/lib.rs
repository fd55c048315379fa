//! Supervision core for a single-machine VR session.
//!
//! Starts a launcher, a VR runtime, a streaming client and the target VR
//! application in dependency order, then keeps them running with bounded,
//! rate-limited restarts. All OS access goes through [`host::ProcessHost`]
//! and all time through [`host::Clock`], so the whole state machine can be
//! driven from tests with [`mock::MockHost`] and [`mock::ManualClock`].

pub mod error;
pub mod graph;
pub mod host;
pub mod launcher;
pub mod mock;
pub mod models;
pub mod observer;
pub mod policy;
pub mod registry;
pub mod supervisor;

pub use error::{HostError, SupervisorError};
pub use host::{Clock, ProcessHost, ShutdownFlag, SystemClock};
pub use models::{ManagedApplication, Role, SupervisorConfig};
pub use registry::AppRegistry;
pub use supervisor::Supervisor;
