//! Support code for the `sedbn` binary.

pub mod args;
pub mod telemetry;
