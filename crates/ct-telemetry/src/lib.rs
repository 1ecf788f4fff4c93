//! Logging setup for caretaker processes.
//!
//! Everything in the workspace logs through `tracing`; this crate only
//! decides where those events go. Human-readable output is the default,
//! JSON output is meant for log shippers (Vector, Loki, ELK).

pub mod logging;
