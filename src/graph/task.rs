//! Task declarations
//!
//! A task is a unit of work: device binding, body (host closure or kernel
//! descriptor), access declarations and explicit predecessor edges. Tasks
//! are immutable once their block scope closes.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::device::{Device, KernelArg, KernelDesc, LaunchCfg};
use crate::resource::View;

/// Unique handle of a task within its graph.
///
/// The inner value is the declaration sequence number, used as the
/// deterministic tie-break when ordering conflicting accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub usize);

impl TaskHandle {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Declared access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Read-modify-write access.
    ReadWrite,
}

impl AccessMode {
    /// Check whether this mode mutates the resource.
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// A (view, mode) access declaration attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// The sub-range being accessed.
    pub view: View,
    /// How it is accessed.
    pub mode: AccessMode,
}

impl Access {
    /// Create an access declaration.
    #[inline]
    pub fn new(view: View, mode: AccessMode) -> Self {
        Self { view, mode }
    }

    /// Two declarations conflict iff their views overlap and at least one
    /// of them writes.
    #[inline]
    pub fn conflicts_with(&self, other: &Access) -> bool {
        (self.mode.is_write() || other.mode.is_write()) && self.view.overlaps(&other.view)
    }
}

/// Type alias for host-executable task bodies.
///
/// Bodies are `Fn` rather than `FnOnce` so an IR tree can be resolved and
/// run more than once.
pub type CpuFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// The executable body of a task: a host closure or a kernel launch.
///
/// The two are mutually exclusive; binding one replaces the other.
#[derive(Clone)]
pub enum TaskBody {
    /// Host-executable closure.
    Cpu(CpuFn),
    /// Device kernel descriptor plus launch configuration and bound args.
    Cuda {
        /// Kernel to launch.
        kernel: KernelDesc,
        /// Launch configuration.
        cfg: LaunchCfg,
        /// Bound arguments, delivered verbatim to the launch collaborator.
        args: Vec<KernelArg>,
    },
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Cpu(_) => f.write_str("TaskBody::Cpu"),
            TaskBody::Cuda { kernel, .. } => write!(f, "TaskBody::Cuda({})", kernel),
        }
    }
}

/// A declared task in the IR tree.
#[derive(Debug, Clone)]
pub struct TaskDecl {
    /// Handle (and declaration sequence number).
    pub handle: TaskHandle,
    /// Name for diagnostics.
    pub name: String,
    /// Device binding; must be set before the graph is finalized.
    pub device: Option<Device>,
    /// Executable body; a task with no body is a pure synchronization point.
    pub body: Option<TaskBody>,
    /// Declared resource accesses.
    pub accesses: SmallVec<[Access; 4]>,
    /// Explicit predecessor edges.
    pub after: SmallVec<[TaskHandle; 2]>,
    /// Set once the enclosing block scope closes.
    pub sealed: bool,
}

impl TaskDecl {
    pub(crate) fn new(handle: TaskHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            device: None,
            body: None,
            accesses: SmallVec::new(),
            after: SmallVec::new(),
            sealed: false,
        }
    }
}
