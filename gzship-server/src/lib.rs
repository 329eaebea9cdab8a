//! Process shell around the gzship pipeline: command line, logging,
//! monitoring endpoint and signal handling.

pub mod cli;
pub mod logging;
pub mod monitor;
pub mod process;
pub mod signals;
