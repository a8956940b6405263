// LogTally - lib.rs
//
// Library entry point, exposing every module for integration testing and
// programmatic use. The `logtally` binary in `main.rs` is a thin clap
// front end over this surface.

pub mod app;
pub mod core;
pub mod platform;
pub mod store;
pub mod util;
