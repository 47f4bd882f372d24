//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use replica_sync_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (Reschedule, PropagationPolicy, binding helpers, etc.)
//! - The object store trait, its implementations and errors
//! - The replicas syncer, the label worker and the reschedule handler
//! - Config types

pub use crate::crd::*;

pub use crate::store::{
    DeadlineStore, InMemoryStore, KubeStore, ObjectKey, ObjectStore, StoreError,
};

pub use crate::controller::replicas::{PatchOutcome, ReplicasSyncer, SyncError, SyncOutcome};
pub use crate::controller::reschedule::{RescheduleError, RescheduleHandler, RescheduleSummary};
pub use crate::controller::scale_ref::{
    AsyncWorker, LabelEvent, LabelEventKind, LabelEventSource, LabelOutcome, ScaleRefLabeler,
    WorkerHandler,
};

pub use crate::config::{ControllerConfig, ReplicaFieldTable};
