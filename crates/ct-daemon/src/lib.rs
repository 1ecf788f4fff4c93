//! Leader-gated maintenance daemon.
//!
//! The [`caretaker::Caretaker`] ticks on a fixed period, asks a
//! [`LeadershipOracle`](ct_core::election::LeadershipOracle) whether this
//! node is the elected leader, and if so fires every registered maintenance
//! job as an independent task without waiting for any of them.
//!
//! - **caretaker**: the tick loop, dispatch and lifecycle
//! - **command**: external-command jobs and leadership probes
//! - **daemon**: wiring from `Config` to a running caretaker

pub mod caretaker;
pub mod command;
pub mod daemon;
