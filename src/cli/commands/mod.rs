//! Command implementations, one module per area.

pub mod config_cmd;
pub mod documents;
pub mod tags;
pub mod upload;
pub mod watch;
