//! Library side of the `vtab` command: CSV folder loading, CSV export,
//! logging setup and the command implementations.

pub mod commands;
pub mod csv_source;
pub mod export;
pub mod logging;
