//! Domain models for the supervisor.
//!
//! - [`Role`]: the closed set of supervised application identities.
//! - [`ManagedApplication`]: how one role is found, observed and launched.
//! - [`SupervisorConfig`]: timing knobs shared by startup, monitoring and the
//!   recovery policy.

mod application;
mod config;
mod role;

pub use application::*;
pub use config::*;
pub use role::*;
