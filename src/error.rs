//! Error types for the TianGong runtime
//!
//! Graph construction and dependency resolution fail synchronously with one
//! of the build-time variants; `TaskFailed` is the only run-time variant and
//! is reported by [`Runtime::run`](crate::runtime::Runtime::run) after
//! in-flight work has drained.

use thiserror::Error;

use crate::graph::TaskHandle;
use crate::resource::ResourceId;

/// Errors produced by graph construction, resolution and execution.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A view's range exceeds the bounds of its resource.
    #[error("view at offset {offset} with length {len} exceeds {resource} bounds ({count} elements)")]
    OutOfRange {
        /// The resource the view refers to.
        resource: ResourceId,
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        len: usize,
        /// Element count of the resource.
        count: usize,
    },

    /// A task was mutated after its block scope closed.
    #[error("{task} is sealed; bindings are only accepted inside its block scope")]
    TaskAlreadySealed {
        /// The sealed task.
        task: TaskHandle,
    },

    /// A task reached resolution without a device binding, or its body does
    /// not match the bound device kind.
    #[error("{task} ({name}) has no usable device binding")]
    UnboundDevice {
        /// The offending task.
        task: TaskHandle,
        /// Task name for diagnostics.
        name: String,
    },

    /// A declared view refers to a resource the runtime does not know.
    #[error("{resource} is not registered with this runtime")]
    DanglingResource {
        /// The unknown resource.
        resource: ResourceId,
    },

    /// Explicit, structural and data edges form a cycle.
    #[error("dependency edges form a cycle")]
    CycleDetected,

    /// The graph (or derived DAG) was mutated after being frozen.
    #[error("graph is frozen and can no longer be modified")]
    GraphFrozen,

    /// A dispatched task body reported an error.
    #[error("{task} ({name}) failed: {cause}")]
    TaskFailed {
        /// The failed task.
        task: TaskHandle,
        /// Task name for diagnostics.
        name: String,
        /// The underlying cause reported by the task body.
        cause: anyhow::Error,
    },
}

impl RuntimeError {
    /// Check whether this error was raised at build/resolve time.
    #[inline]
    pub fn is_build_error(&self) -> bool {
        !matches!(self, RuntimeError::TaskFailed { .. })
    }
}
