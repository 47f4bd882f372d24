//! # Controller
//!
//! Core controller modules.
//!
//! - `backoff`: Fibonacci backoff for failing reconciles
//! - `mutation`: Read-compute-diff-patch write discipline shared by every writer
//! - `replicas`: Autoscaler → scale target replica synchronization
//! - `scale_ref`: Asynchronous maintenance of the autoscaler ownership label
//! - `reschedule`: Reschedule command → binding trigger resolution

pub mod backoff;
pub mod mutation;
pub mod replicas;
pub mod reschedule;
pub mod scale_ref;
