//! # Configuration
//!
//! Process-wide, read-only configuration.
//!
//! - `controller.rs` - Controller settings loaded from environment variables
//! - `replica_fields.rs` - The (apiVersion, kind) → replica field path table

mod controller;
mod replica_fields;

pub use controller::{ControllerConfig, LogFormat};
pub use replica_fields::{ReplicaFieldEntry, ReplicaFieldTable};
