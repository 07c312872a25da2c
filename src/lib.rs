//! Discrete-event simulator for a Chord distributed hash table.
//!
//! The core reproduces the Chord protocol (ring pointers, finger table,
//! successor list, stabilization, iterative and message-driven lookup) over
//! a deterministic, seeded event scheduler. Two execution modes are
//! supported: fully asynchronous per-node stabilization (`MaintenanceMode::PerNode`)
//! and a batched "global stabilizer" used for large-N churn experiments
//! (`MaintenanceMode::Batched`).
//!
//! Experiment drivers (load balance, path length, mass failure, churn) live
//! under [`experiments`] as external collaborators over the public API; they
//! do not participate in the protocol's correctness.

#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod event;
pub mod experiments;
pub mod identifier;
pub mod maintenance;
pub mod node;
pub mod rng;
pub mod telemetry;
pub mod time;

mod environment;

pub use config::{Config, ConfigError};
pub use environment::{Environment, MaintenanceMode};
pub use event::{EventKind, Rpc, ScheduledEvent};
pub use identifier::Identifier;
pub use node::Node;
pub use rng::DeterministicRng;
pub use time::{Duration, VirtualTime};
