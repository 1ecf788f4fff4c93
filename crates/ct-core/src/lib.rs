//! Core types for the caretaker maintenance runner.
//!
//! - **config**: TOML configuration (`~/.caretaker/config.toml`) and validation
//! - **election**: the `LeadershipOracle` seam plus in-process oracles
//! - **job**: the `MaintenanceJob` seam and the per-tick `JobRegistry`
//! - **shutdown**: cooperative, idempotent shutdown signalling

pub mod config;
pub mod election;
pub mod job;
pub mod shutdown;
