// LogTally - core/mod.rs
//
// Pure domain logic: line grammar, user-agent classification, report
// definitions, and export. No I/O beyond caller-supplied writers.

pub mod classify;
pub mod export;
pub mod model;
pub mod parser;
pub mod report;
