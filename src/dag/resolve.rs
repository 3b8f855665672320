//! Dependency resolution: IR tree to executable DAG
//!
//! The resolver walks the finalized IR bottom-up. Every block produces an
//! entry frontier (nodes with no unsatisfied predecessor inside the block)
//! and an exit frontier (nodes with no successor inside the block), used to
//! splice structural edges between sibling blocks. Declared access conflicts
//! are then converted into data edges, explicit `after` edges merged in, and
//! the result checked for cycles.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::graph::{
    Access, AccessMode, BlockId, BlockKind, ChildRef, Graph, TaskBody, TaskHandle,
};
use crate::resource::{ResourceRegistry, View};

use super::graph::{ExecDag, GateSpec, IterSpec, SelectInfo};
use super::node::{GuardArm, NodeKind};
use super::node_id::NodeId;

/// Entry/exit boundary of a lowered block.
#[derive(Debug, Clone, Default)]
struct Frontier {
    entry: Vec<NodeId>,
    exit: Vec<NodeId>,
}

impl Frontier {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.entry.is_empty() && self.exit.is_empty()
    }
}

/// Resolve a finalized graph into an executable DAG.
///
/// Fails with [`RuntimeError::UnboundDevice`] if a task lacks a usable
/// device binding, [`RuntimeError::DanglingResource`] /
/// [`RuntimeError::OutOfRange`] if a declared view refers outside the
/// registry, and [`RuntimeError::CycleDetected`] if explicit edges combined
/// with structural and data edges form a cycle.
pub fn resolve(graph: &Graph, registry: &ResourceRegistry) -> Result<ExecDag, RuntimeError> {
    validate_tasks(graph, registry)?;

    let mut resolver = Resolver {
        graph,
        registry,
        dag: ExecDag::new(),
        node_of: IndexMap::new(),
        join_seq: 0,
        select_seq: 0,
    };
    resolver.lower_block(graph.root())?;
    resolver.apply_after_edges()?;
    resolver.apply_conflict_edges()?;

    let mut dag = resolver.dag;
    dag.topological_order()?;
    dag.freeze();
    debug!(
        graph = %graph.name(),
        nodes = dag.num_nodes(),
        edges = dag.edge_set().len(),
        "resolved graph"
    );
    Ok(dag)
}

fn validate_tasks(graph: &Graph, registry: &ResourceRegistry) -> Result<(), RuntimeError> {
    for task in graph.tasks() {
        let device = task.device.ok_or_else(|| RuntimeError::UnboundDevice {
            task: task.handle,
            name: task.name.clone(),
        })?;
        // Body and device kind must agree; a bodyless task is a pure
        // synchronization point and runs anywhere.
        let usable = match &task.body {
            None => true,
            Some(TaskBody::Cpu(_)) => device.is_cpu(),
            Some(TaskBody::Cuda { .. }) => !device.is_cpu(),
        };
        if !usable {
            return Err(RuntimeError::UnboundDevice {
                task: task.handle,
                name: task.name.clone(),
            });
        }
        for access in &task.accesses {
            validate_view(registry, &access.view)?;
        }
    }
    Ok(())
}

fn validate_view(registry: &ResourceRegistry, view: &View) -> Result<(), RuntimeError> {
    let count = registry.bounds(view.resource)?;
    if view.end() > count {
        return Err(RuntimeError::OutOfRange {
            resource: view.resource,
            offset: view.offset,
            len: view.len,
            count,
        });
    }
    Ok(())
}

struct Resolver<'a> {
    graph: &'a Graph,
    registry: &'a ResourceRegistry,
    dag: ExecDag,
    node_of: IndexMap<TaskHandle, NodeId>,
    join_seq: usize,
    select_seq: usize,
}

impl<'a> Resolver<'a> {
    fn lower_child(&mut self, child: &ChildRef) -> Result<Frontier, RuntimeError> {
        match child {
            ChildRef::Task(handle) => self.lower_task(*handle),
            ChildRef::Block(block) => self.lower_block(*block),
        }
    }

    fn lower_task(&mut self, handle: TaskHandle) -> Result<Frontier, RuntimeError> {
        let decl = self.graph.task(handle);
        let id = self.dag.add_node(NodeKind::Task(handle), decl.name.clone())?;
        let node = self.dag.node_mut(id);
        node.set_device(decl.device);
        for access in &decl.accesses {
            node.push_access(*access);
        }
        self.node_of.insert(handle, id);
        Ok(Frontier {
            entry: vec![id],
            exit: vec![id],
        })
    }

    fn lower_block(&mut self, block: BlockId) -> Result<Frontier, RuntimeError> {
        let node = self.graph.block(block);
        match &node.kind {
            BlockKind::Seq => self.lower_chained(&node.children),
            BlockKind::Par => self.lower_par(&node.children),
            BlockKind::Loop { opts } => {
                if opts.cross_iter_parallel {
                    self.lower_gated_loop(&node.children, opts.max_inflight.max(1))
                } else {
                    // Conservative default: iterations chain exactly like
                    // Seq children, so unspecified cross-iteration
                    // dependencies never race.
                    self.lower_chained(&node.children)
                }
            }
            BlockKind::Branch { pred } => self.lower_branch(*pred, &node.children),
        }
    }

    /// Seq semantics: each child's exit frontier precedes the next child's
    /// entry frontier. Textual order is a structural guarantee independent
    /// of declared accesses; empty children contribute nothing.
    fn lower_chained(&mut self, children: &[ChildRef]) -> Result<Frontier, RuntimeError> {
        let mut fronts: Vec<Frontier> = Vec::with_capacity(children.len());
        for child in children {
            let f = self.lower_child(child)?;
            if !f.is_empty() {
                fronts.push(f);
            }
        }
        for k in 1..fronts.len() {
            let (prev, next) = (&fronts[k - 1], &fronts[k]);
            for &x in &prev.exit {
                for &y in &next.entry {
                    self.dag.add_edge(x, y)?;
                }
            }
        }
        Ok(match (fronts.first(), fronts.last()) {
            (Some(first), Some(last)) => Frontier {
                entry: first.entry.clone(),
                exit: last.exit.clone(),
            },
            _ => Frontier::empty(),
        })
    }

    /// Par semantics: children are unordered; a synthetic join depends on
    /// the union of their exit frontiers and becomes the single exit.
    fn lower_par(&mut self, children: &[ChildRef]) -> Result<Frontier, RuntimeError> {
        let mut entry = Vec::new();
        let mut exits = Vec::new();
        for child in children {
            let f = self.lower_child(child)?;
            entry.extend(f.entry);
            exits.extend(f.exit);
        }
        if entry.is_empty() && exits.is_empty() {
            return Ok(Frontier::empty());
        }
        let join = self.alloc_join()?;
        for x in exits {
            self.dag.add_edge(x, join)?;
        }
        Ok(Frontier {
            entry,
            exit: vec![join],
        })
    }

    /// Parallel-mode loop: iterations are not chained; only declared and
    /// explicit dependencies constrain them. The admission gate limits
    /// concurrency without affecting correctness ordering.
    fn lower_gated_loop(
        &mut self,
        children: &[ChildRef],
        max_inflight: usize,
    ) -> Result<Frontier, RuntimeError> {
        let mut iterations = Vec::with_capacity(children.len());
        let mut entry = Vec::new();
        let mut exit = Vec::new();
        for child in children {
            let start = self.dag.num_nodes();
            let f = self.lower_child(child)?;
            let end = self.dag.num_nodes();
            if f.is_empty() {
                continue;
            }
            iterations.push(IterSpec {
                entry: f.entry.clone(),
                members: (start..end).map(NodeId).collect(),
            });
            entry.extend(f.entry);
            exit.extend(f.exit);
        }
        if iterations.is_empty() {
            return Ok(Frontier::empty());
        }
        trace!(iterations = iterations.len(), max_inflight, "admission-gated loop");
        self.dag.push_gate(GateSpec {
            max_inflight,
            iterations,
        });
        Ok(Frontier { entry, exit })
    }

    /// Dynamic conditional: a select node reads the predicate scalar; both
    /// arms' entries hang off it with guard tags, both arms' exits feed a
    /// join which becomes the block's exit.
    fn lower_branch(
        &mut self,
        pred: View,
        children: &[ChildRef],
    ) -> Result<Frontier, RuntimeError> {
        validate_view(self.registry, &pred)?;
        let (then_block, else_block) = match children {
            [ChildRef::Block(t), ChildRef::Block(e)] => (*t, *e),
            _ => unreachable!("branch blocks always carry exactly two arms"),
        };

        let select = self
            .dag
            .add_node(NodeKind::Select { pred }, format!("select#{}", self.select_seq))?;
        self.select_seq += 1;
        self.dag
            .node_mut(select)
            .push_access(Access::new(pred, AccessMode::Read));

        let then_start = self.dag.num_nodes();
        let then_front = self.lower_block(then_block)?;
        let then_end = self.dag.num_nodes();
        let else_start = then_end;
        let else_front = self.lower_block(else_block)?;
        let else_end = self.dag.num_nodes();

        for &n in &then_front.entry {
            self.dag.add_edge(select, n)?;
            self.dag.node_mut(n).set_guard(select, GuardArm::Then);
        }
        for &n in &else_front.entry {
            self.dag.add_edge(select, n)?;
            self.dag.node_mut(n).set_guard(select, GuardArm::Else);
        }

        let join = self.alloc_join()?;
        // Keeps the join ordered after resolution even when an arm is empty.
        self.dag.add_edge(select, join)?;
        for &x in &then_front.exit {
            self.dag.add_edge(x, join)?;
        }
        for &x in &else_front.exit {
            self.dag.add_edge(x, join)?;
        }

        self.dag.push_select(SelectInfo {
            node: select,
            pred,
            then_members: (then_start..then_end).map(NodeId).collect(),
            else_members: (else_start..else_end).map(NodeId).collect(),
        });

        Ok(Frontier {
            entry: vec![select],
            exit: vec![join],
        })
    }

    fn alloc_join(&mut self) -> Result<NodeId, RuntimeError> {
        let join = self
            .dag
            .add_node(NodeKind::Join, format!("join#{}", self.join_seq))?;
        self.join_seq += 1;
        Ok(join)
    }

    /// Merge explicit `after` edges into the DAG.
    fn apply_after_edges(&mut self) -> Result<(), RuntimeError> {
        for task in self.graph.tasks() {
            let to = self.node_of[&task.handle];
            for pred in &task.after {
                let from = self.node_of[pred];
                trace!(%from, %to, "explicit edge");
                self.dag.add_edge(from, to)?;
            }
        }
        Ok(())
    }

    /// Convert declared access conflicts into data edges.
    ///
    /// For each pair of access-carrying nodes in declaration order, an edge
    /// is added only when the pair conflicts and no structural or transitive
    /// edge already orders them - data edges augment structural order, never
    /// contradict it. Read-only pairs never conflict.
    fn apply_conflict_edges(&mut self) -> Result<(), RuntimeError> {
        let carriers: Vec<NodeId> = self
            .dag
            .nodes()
            .iter()
            .filter(|n| !n.accesses().is_empty())
            .map(|n| n.id())
            .collect();
        for i in 0..carriers.len() {
            for j in (i + 1)..carriers.len() {
                let (a, b) = (carriers[i], carriers[j]);
                if !self.conflicts(a, b) {
                    continue;
                }
                if self.dag.reachable(a, b) || self.dag.reachable(b, a) {
                    continue;
                }
                trace!(%a, %b, "conflict edge");
                self.dag.add_edge(a, b)?;
            }
        }
        Ok(())
    }

    fn conflicts(&self, a: NodeId, b: NodeId) -> bool {
        let lhs = self.dag.node(a).accesses();
        let rhs = self.dag.node(b).accesses();
        lhs.iter()
            .any(|x| rhs.iter().any(|y| x.conflicts_with(y)))
    }
}
