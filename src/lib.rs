//! Desktop side of the VR session supervisor: the real process table,
//! config file, logging setup and login autorun.

pub mod autorun;
pub mod config;
pub mod host;
pub mod logging;

pub use autorun::{Autorun, AutorunStatus};
pub use config::FileConfig;
pub use host::SystemHost;
