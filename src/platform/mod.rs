// LogTally - platform/mod.rs
//
// OS-facing concerns: platform directories, config file, input discovery.

pub mod config;
pub mod fs;
