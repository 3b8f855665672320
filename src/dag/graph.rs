//! The executable DAG
//!
//! Derived from the IR by the resolver, drained by the scheduler. The DAG is
//! not the source of truth: it is discarded after a run and rebuilt from the
//! IR when needed.

use std::fmt;

use serde::Serialize;

use crate::error::RuntimeError;
use crate::resource::View;

use super::node::{ExecNode, NodeKind};
use super::node_id::NodeId;

/// Per-select bookkeeping: the members of each arm, skipped wholesale when
/// the predicate resolves against them.
#[derive(Debug, Clone)]
pub struct SelectInfo {
    /// The branch-select node.
    pub node: NodeId,
    /// The predicate slot it reads.
    pub pred: View,
    /// Every node lowered from the then-arm subtree.
    pub then_members: Vec<NodeId>,
    /// Every node lowered from the else-arm subtree.
    pub else_members: Vec<NodeId>,
}

/// One iteration subtree of an admission-gated loop.
#[derive(Debug, Clone)]
pub struct IterSpec {
    /// Entry-frontier nodes, withheld from readiness until admission.
    pub entry: Vec<NodeId>,
    /// Every node of the iteration subtree.
    pub members: Vec<NodeId>,
}

/// Admission gate spec for one cross-iteration-parallel loop.
#[derive(Debug, Clone)]
pub struct GateSpec {
    /// Maximum concurrently in-flight iterations.
    pub max_inflight: usize,
    /// Iteration subtrees in index order.
    pub iterations: Vec<IterSpec>,
}

/// The executable dependency DAG.
///
/// Nodes are tasks plus synthetic join/select anchors; edges are
/// happens-before relations. The DAG is frozen after resolution; mutation
/// afterwards fails with [`RuntimeError::GraphFrozen`].
#[derive(Debug, Default)]
pub struct ExecDag {
    nodes: Vec<ExecNode>,
    selects: Vec<SelectInfo>,
    gates: Vec<GateSpec>,
    frozen: bool,
}

impl ExecDag {
    /// Create an empty DAG.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the DAG has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    #[inline]
    pub fn node(&self, id: NodeId) -> &ExecNode {
        &self.nodes[id.0]
    }

    /// All nodes in id order.
    #[inline]
    pub fn nodes(&self) -> &[ExecNode] {
        &self.nodes
    }

    /// Branch-select bookkeeping.
    #[inline]
    pub fn selects(&self) -> &[SelectInfo] {
        &self.selects
    }

    /// Loop admission gates.
    #[inline]
    pub fn gates(&self) -> &[GateSpec] {
        &self.gates
    }

    /// Whether the DAG has been frozen.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Check for an edge `from -> to`.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes[from.0].succs().contains(&to)
    }

    /// Nodes with no predecessors.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.id())
            .collect()
    }

    /// Nodes with no successors.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id())
            .collect()
    }

    /// The full edge set in deterministic (source id, insertion) order.
    ///
    /// Building the same IR twice yields identical edge sets.
    pub fn edge_set(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        for node in &self.nodes {
            for succ in node.succs() {
                edges.push((node.id(), *succ));
            }
        }
        edges
    }

    /// Check whether `to` is reachable from `from` along edges.
    pub fn reachable(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        visited[from.0] = true;
        while let Some(n) = stack.pop() {
            for &s in self.nodes[n.0].succs() {
                if s == to {
                    return true;
                }
                if !visited[s.0] {
                    visited[s.0] = true;
                    stack.push(s);
                }
            }
        }
        false
    }

    /// A topological order of all nodes.
    ///
    /// Fails with [`RuntimeError::CycleDetected`] if the edges do not form a
    /// DAG.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, RuntimeError> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.num_preds()).collect();
        let mut queue: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.id())
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut head = 0;
        while head < queue.len() {
            let n = queue[head];
            head += 1;
            order.push(n);
            for &s in self.nodes[n.0].succs() {
                indegree[s.0] -= 1;
                if indegree[s.0] == 0 {
                    queue.push(s);
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(RuntimeError::CycleDetected);
        }
        Ok(order)
    }

    /// Serialize a summary of the DAG as pretty JSON, for debugging.
    pub fn dump_json(&self) -> String {
        #[derive(Serialize)]
        struct NodeDump<'a> {
            id: usize,
            name: &'a str,
            kind: &'static str,
            device: Option<String>,
            guard: Option<(usize, super::node::GuardArm)>,
            preds: Vec<usize>,
            succs: Vec<usize>,
        }
        #[derive(Serialize)]
        struct DagDump<'a> {
            nodes: Vec<NodeDump<'a>>,
        }
        let dump = DagDump {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeDump {
                    id: n.id().value(),
                    name: n.name(),
                    kind: match n.kind() {
                        NodeKind::Task(_) => "task",
                        NodeKind::Join => "join",
                        NodeKind::Select { .. } => "select",
                    },
                    device: n.device().map(|d| d.to_string()),
                    guard: n.guard().map(|(s, arm)| (s.value(), arm)),
                    preds: n.preds().iter().map(|p| p.value()).collect(),
                    succs: n.succs().iter().map(|s| s.value()).collect(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&dump).unwrap_or_default()
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind, name: impl Into<String>) -> Result<NodeId, RuntimeError> {
        if self.frozen {
            return Err(RuntimeError::GraphFrozen);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ExecNode::new(id, kind, name));
        Ok(id)
    }

    /// Add an edge `from -> to`. Duplicate edges are ignored; a self-edge
    /// is kept and surfaces as a cycle at the final acyclicity check.
    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), RuntimeError> {
        if self.frozen {
            return Err(RuntimeError::GraphFrozen);
        }
        if self.has_edge(from, to) {
            return Ok(());
        }
        self.nodes[from.0].push_succ(to);
        self.nodes[to.0].push_pred(from);
        Ok(())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ExecNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push_select(&mut self, info: SelectInfo) {
        self.selects.push(info);
    }

    pub(crate) fn push_gate(&mut self, gate: GateSpec) {
        self.gates.push(gate);
    }

    /// Freeze the DAG; no further structural mutation is accepted.
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl fmt::Display for ExecDag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExecDag(nodes: {}, edges: {}, selects: {}, gates: {})",
            self.nodes.len(),
            self.edge_set().len(),
            self.selects.len(),
            self.gates.len()
        )
    }
}
