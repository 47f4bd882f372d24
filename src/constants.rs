//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label and annotation keys are part of the wire contract with the rest of
//! the control plane and must not change. Defaults can be overridden via
//! environment variables (see [`crate::config::ControllerConfig`]).

/// Controller name used for field management and log context
pub const CONTROLLER_NAME: &str = "hpa-replicas-syncer";

/// Label carrying the namespace of the PropagationPolicy that claims a workload
pub const PROPAGATION_POLICY_NAMESPACE_LABEL: &str = "propagationpolicy.karmada.io/namespace";

/// Label carrying the name of the PropagationPolicy that claims a workload
pub const PROPAGATION_POLICY_NAME_LABEL: &str = "propagationpolicy.karmada.io/name";

/// Label carrying the name of the ClusterPropagationPolicy that claims a workload
pub const CLUSTER_PROPAGATION_POLICY_LABEL: &str = "clusterpropagationpolicy.karmada.io/name";

/// Label set on a scale target naming the autoscaler that controls it
pub const SCALE_CONTROL_BY_HPA_LABEL: &str = "horizontalpodautoscaler.karmada.io/name";

/// Annotation stamped on a scale target when the controller rewrites its replicas.
/// Watchers of resource templates skip the write that carries it.
pub const SKIP_RECONCILE_AT_ANNOTATION: &str = "resourcetemplate.karmada.io/skip-reconcile-at";

/// Separator used in replica field paths (e.g. `spec.replicas`)
pub const FIELD_PATH_SEPARATOR: char = '.';

/// Maximum length of a Reschedule name
pub const RESCHEDULE_NAME_MAX_LENGTH: usize = 32;

/// Default HTTP server port for metrics, probes and the command endpoint
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default number of async label workers
pub const DEFAULT_LABEL_WORKER_COUNT: usize = 1;

/// Default deadline for a single object store request (seconds)
pub const DEFAULT_STORE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default minimum requeue delay after a failed reconcile (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum requeue delay after a failed reconcile (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting a watch stream that ended (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;
