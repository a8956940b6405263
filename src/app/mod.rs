// LogTally - app/mod.rs
//
// Application layer: orchestration of ingest runs and report generation.
// Dependencies: core, store layers.
// Must NOT depend on: platform specifics.

pub mod ingest;
pub mod report;
