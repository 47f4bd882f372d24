//! Replica Sync Controller Library
//!
//! Control-plane controller for a multi-cluster orchestrator:
//!
//! - mirrors autoscaler decisions onto workloads whose policy divides replicas
//!   across clusters ([`controller::replicas`])
//! - labels every scale target with the autoscaler controlling it
//!   ([`controller::scale_ref`])
//! - executes Reschedule commands by advancing the reschedule trigger of the
//!   selected bindings ([`controller::reschedule`])
//!
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use replica_sync_controller::prelude::*;
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
