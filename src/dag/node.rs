//! Executable DAG nodes
//!
//! Nodes are tasks plus the synthetic join and branch-select anchors the
//! resolver inserts for fork-join and runtime-conditional blocks. Edges are
//! happens-before relations stored as id lists on each node.

use std::fmt;

use smallvec::SmallVec;

use crate::device::Device;
use crate::graph::{Access, TaskHandle};
use crate::resource::View;

use super::node_id::NodeId;

/// Which arm of a dynamic conditional a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GuardArm {
    /// Activated when the predicate reads `true`.
    Then,
    /// Activated when the predicate reads `false`.
    Else,
}

/// Kind of executable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A declared task.
    Task(TaskHandle),
    /// Synthetic fork-join anchor; no body, pure ordering.
    Join,
    /// Synthetic branch-select anchor; reads its predicate scalar when it
    /// becomes ready and skips the losing arm.
    Select {
        /// The scalar slot holding the predicate.
        pred: View,
    },
}

impl NodeKind {
    /// Check whether the node carries a task body.
    #[inline]
    pub fn is_task(&self) -> bool {
        matches!(self, NodeKind::Task(_))
    }

    /// Check whether the node is a synthetic ordering anchor.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        !self.is_task()
    }
}

/// A node in the executable DAG.
#[derive(Debug, Clone)]
pub struct ExecNode {
    id: NodeId,
    kind: NodeKind,
    name: String,
    device: Option<Device>,
    accesses: SmallVec<[Access; 4]>,
    preds: SmallVec<[NodeId; 4]>,
    succs: SmallVec<[NodeId; 4]>,
    guard: Option<(NodeId, GuardArm)>,
}

impl ExecNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            device: None,
            accesses: SmallVec::new(),
            preds: SmallVec::new(),
            succs: SmallVec::new(),
            guard: None,
        }
    }

    /// The node's id.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's kind.
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Name for diagnostics (task name, or a synthesized anchor name).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device binding (task nodes only).
    #[inline]
    pub fn device(&self) -> Option<Device> {
        self.device
    }

    /// The task handle, if this is a task node.
    #[inline]
    pub fn task_handle(&self) -> Option<TaskHandle> {
        match self.kind {
            NodeKind::Task(h) => Some(h),
            _ => None,
        }
    }

    /// Declared accesses participating in conflict analysis.
    #[inline]
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// Happens-before predecessors.
    #[inline]
    pub fn preds(&self) -> &[NodeId] {
        &self.preds
    }

    /// Happens-before successors.
    #[inline]
    pub fn succs(&self) -> &[NodeId] {
        &self.succs
    }

    /// The guard tag, if this node is an entry of a dynamic-conditional arm:
    /// the select node and the arm value that activates it.
    #[inline]
    pub fn guard(&self) -> Option<(NodeId, GuardArm)> {
        self.guard
    }

    /// Check whether this node has no predecessors.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.preds.is_empty()
    }

    /// Check whether this node has no successors.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.succs.is_empty()
    }

    /// Number of predecessors.
    #[inline]
    pub fn num_preds(&self) -> usize {
        self.preds.len()
    }

    pub(crate) fn set_device(&mut self, device: Option<Device>) {
        self.device = device;
    }

    pub(crate) fn set_guard(&mut self, select: NodeId, arm: GuardArm) {
        self.guard = Some((select, arm));
    }

    pub(crate) fn push_access(&mut self, access: Access) {
        self.accesses.push(access);
    }

    pub(crate) fn push_pred(&mut self, pred: NodeId) {
        self.preds.push(pred);
    }

    pub(crate) fn push_succ(&mut self, succ: NodeId) {
        self.succs.push(succ);
    }
}

impl fmt::Display for ExecNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecNode({}: {})", self.id, self.name)
    }
}
