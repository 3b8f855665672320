//! Scheduler: topological drain of the executable DAG
//!
//! A single driver (the thread that called `run`) pops ready nodes, routes
//! task bodies to the device-appropriate executor and processes completion
//! signals. Synthetic join and branch-select nodes resolve inline on the
//! driver. The DAG's edges are the only ordering guarantee; everything
//! without a relative edge may run concurrently.

pub mod executor;
pub mod state;

pub use executor::{Completion, CpuExecutor, CudaExecutor, KernelLauncher, NullLauncher};
pub use state::NodeState;

use std::collections::{HashMap, VecDeque};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Sender};
use tracing::{debug, trace, warn};

use crate::dag::{ExecDag, NodeId, NodeKind};
use crate::error::RuntimeError;
use crate::graph::{Graph, TaskBody};
use crate::resource::HostStore;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// CPU pool size.
    pub cpu_threads: usize,
    /// Stream workers per CUDA device.
    pub cuda_streams: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            cpu_threads: num_cpus,
            cuda_streams: 4,
        }
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Default)]
pub struct ExecReport {
    /// Task bodies that executed.
    pub executed: usize,
    /// Nodes skipped behind unchosen branch arms.
    pub skipped: usize,
    /// Synthetic join/select nodes resolved.
    pub synthetic: usize,
    /// Wall-clock duration of the drain.
    pub elapsed: Duration,
}

/// Per-gate runtime state for one admission-limited loop.
struct GateState {
    max_inflight: usize,
    /// Iterations admitted so far (a prefix of the index order).
    admitted: usize,
    /// Admitted-but-not-yet-terminal iterations.
    inflight: usize,
    /// Non-terminal member count per iteration.
    iter_remaining: Vec<usize>,
    /// Entry nodes whose predecessors are satisfied but whose iteration is
    /// not yet admitted.
    parked: Vec<NodeId>,
}

/// One topological drain over a resolved DAG.
pub(crate) struct Scheduler<'a> {
    dag: &'a ExecDag,
    graph: &'a Graph,
    store: &'a HostStore,
    cpu: &'a CpuExecutor,
    cuda: &'a HashMap<u32, CudaExecutor>,
    states: Vec<NodeState>,
    preds_remaining: Vec<usize>,
    ready: VecDeque<NodeId>,
    dispatched: usize,
    terminal: usize,
    failure: Option<RuntimeError>,
    gates: Vec<GateState>,
    /// Entry node -> (gate, iteration) for admission holds.
    gate_entry: HashMap<NodeId, (usize, usize)>,
    /// Member node -> (gate, iteration) for release accounting.
    gate_member: HashMap<NodeId, (usize, usize)>,
    /// Select node -> index into the DAG's select table.
    select_of: HashMap<NodeId, usize>,
    report: ExecReport,
}

impl<'a> Scheduler<'a> {
    pub(crate) fn new(
        dag: &'a ExecDag,
        graph: &'a Graph,
        store: &'a HostStore,
        cpu: &'a CpuExecutor,
        cuda: &'a HashMap<u32, CudaExecutor>,
    ) -> Self {
        let states = vec![NodeState::Pending; dag.num_nodes()];
        let preds_remaining = dag.nodes().iter().map(|n| n.num_preds()).collect();

        let mut gates = Vec::with_capacity(dag.gates().len());
        let mut gate_entry = HashMap::new();
        let mut gate_member = HashMap::new();
        for (g, spec) in dag.gates().iter().enumerate() {
            for (it, iter) in spec.iterations.iter().enumerate() {
                for &n in &iter.entry {
                    gate_entry.insert(n, (g, it));
                }
                for &m in &iter.members {
                    gate_member.insert(m, (g, it));
                }
            }
            gates.push(GateState {
                max_inflight: spec.max_inflight,
                admitted: 0,
                inflight: 0,
                iter_remaining: spec.iterations.iter().map(|i| i.members.len()).collect(),
                parked: Vec::new(),
            });
        }

        let select_of = dag
            .selects()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.node, i))
            .collect();

        Self {
            dag,
            graph,
            store,
            cpu,
            cuda,
            states,
            preds_remaining,
            ready: VecDeque::new(),
            dispatched: 0,
            terminal: 0,
            failure: None,
            gates,
            gate_entry,
            gate_member,
            select_of,
            report: ExecReport::default(),
        }
    }

    /// Drain the DAG, blocking until every node is terminal (or until a
    /// recorded failure has finished draining in-flight work).
    pub(crate) fn run(mut self) -> Result<ExecReport, RuntimeError> {
        let started = Instant::now();
        let total = self.dag.num_nodes();
        let (tx, rx) = unbounded::<Completion>();

        for g in 0..self.gates.len() {
            self.admit(g);
        }
        for node in self.dag.roots() {
            self.try_ready(node);
        }

        loop {
            if self.failure.is_some() {
                // Graceful drain: dispatched work finishes, nothing new
                // is admitted.
                if self.dispatched == 0 {
                    break;
                }
                let completion = rx.recv().expect("executor channel closed while draining");
                self.on_completion(completion);
                continue;
            }
            if self.terminal == total {
                break;
            }
            if let Some(node) = self.ready.pop_front() {
                self.dispatch(node, &tx);
                continue;
            }
            if self.dispatched > 0 {
                let completion = rx.recv().expect("executor channel closed mid-run");
                self.on_completion(completion);
                continue;
            }
            debug_assert!(false, "scheduler stalled with no ready or dispatched work");
            break;
        }

        self.report.elapsed = started.elapsed();
        debug!(
            graph = %self.graph.name(),
            executed = self.report.executed,
            skipped = self.report.skipped,
            elapsed_us = self.report.elapsed.as_micros() as u64,
            "drain finished"
        );
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }

    fn dispatch(&mut self, node: NodeId, tx: &Sender<Completion>) {
        if self.states[node.0] != NodeState::Ready {
            return;
        }
        match self.dag.node(node).kind() {
            NodeKind::Join => {
                trace!(%node, "join resolved");
                self.report.synthetic += 1;
                self.complete(node);
            }
            NodeKind::Select { pred } => {
                let taken = self
                    .store
                    .get_blocking::<bool>(pred.resource)
                    .expect("branch predicate is always a bool scalar");
                trace!(%node, taken, "branch resolved");
                let info = &self.dag.selects()[self.select_of[&node]];
                let losers = if taken {
                    info.else_members.clone()
                } else {
                    info.then_members.clone()
                };
                self.skip_subtree(&losers);
                self.report.synthetic += 1;
                self.complete(node);
            }
            NodeKind::Task(handle) => {
                let decl = self.graph.task(*handle);
                match &decl.body {
                    None => {
                        // Pure synchronization point.
                        self.report.executed += 1;
                        self.complete(node);
                    }
                    Some(TaskBody::Cpu(body)) => {
                        trace!(%node, name = %decl.name, "dispatch cpu");
                        self.states[node.0] = NodeState::Dispatched;
                        self.dispatched += 1;
                        self.cpu.dispatch(node, body.clone(), tx.clone());
                    }
                    Some(TaskBody::Cuda { kernel, cfg, args }) => {
                        let device = self
                            .dag
                            .node(node)
                            .device()
                            .expect("resolved task nodes always carry a device");
                        match self.cuda.get(&device.id) {
                            Some(exec) => {
                                trace!(%node, name = %decl.name, %device, "dispatch cuda");
                                self.states[node.0] = NodeState::Dispatched;
                                self.dispatched += 1;
                                exec.dispatch(
                                    node,
                                    kernel.clone(),
                                    *cfg,
                                    args.clone(),
                                    tx.clone(),
                                );
                            }
                            None => {
                                warn!(%node, %device, "no executor for device");
                                self.record_failure(
                                    node,
                                    anyhow::anyhow!("no executor for {}", device),
                                );
                                self.complete(node);
                            }
                        }
                    }
                }
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        self.dispatched -= 1;
        match completion.result {
            Ok(()) => {
                self.report.executed += 1;
            }
            Err(cause) => {
                self.record_failure(completion.node, cause);
            }
        }
        self.complete(completion.node);
    }

    fn record_failure(&mut self, node: NodeId, cause: anyhow::Error) {
        if self.failure.is_some() {
            return;
        }
        let exec_node = self.dag.node(node);
        let task = exec_node.task_handle().unwrap_or(crate::graph::TaskHandle(0));
        warn!(%node, name = %exec_node.name(), %cause, "task failed; draining");
        self.failure = Some(RuntimeError::TaskFailed {
            task,
            name: exec_node.name().to_string(),
            cause,
        });
    }

    /// Mark `node` completed and release its successors and gate slot.
    fn complete(&mut self, node: NodeId) {
        self.states[node.0] = NodeState::Completed;
        self.terminal += 1;
        self.gate_release(node);
        self.notify_succs(node);
    }

    /// Skip an unchosen branch arm wholesale; skips propagate forward like
    /// completions but bodies never run.
    fn skip_subtree(&mut self, members: &[NodeId]) {
        for &m in members {
            if self.states[m.0].is_terminal() {
                continue;
            }
            self.states[m.0] = NodeState::Skipped;
            self.report.skipped += 1;
            self.terminal += 1;
            self.gate_release(m);
            self.notify_succs(m);
        }
    }

    fn notify_succs(&mut self, node: NodeId) {
        for &succ in self.dag.node(node).succs() {
            let remaining = &mut self.preds_remaining[succ.0];
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 && self.states[succ.0] == NodeState::Pending {
                self.try_ready(succ);
            }
        }
    }

    /// Transition a node to Ready, unless a failure stops admissions or an
    /// admission gate withholds its iteration.
    fn try_ready(&mut self, node: NodeId) {
        if self.failure.is_some() {
            return;
        }
        if let Some(&(g, it)) = self.gate_entry.get(&node) {
            if it >= self.gates[g].admitted {
                trace!(%node, gate = g, iteration = it, "held at admission gate");
                self.gates[g].parked.push(node);
                return;
            }
        }
        self.states[node.0] = NodeState::Ready;
        self.ready.push_back(node);
    }

    /// Release accounting when a gated-iteration member reaches a terminal
    /// state; a fully terminal iteration frees an in-flight slot.
    fn gate_release(&mut self, node: NodeId) {
        let Some(&(g, it)) = self.gate_member.get(&node) else {
            return;
        };
        let gate = &mut self.gates[g];
        gate.iter_remaining[it] -= 1;
        if gate.iter_remaining[it] == 0 && it < gate.admitted {
            gate.inflight -= 1;
            self.admit(g);
        }
    }

    /// Admit further iterations, in index order, while slots are free.
    fn admit(&mut self, g: usize) {
        loop {
            let gate = &mut self.gates[g];
            if gate.admitted >= gate.iter_remaining.len() || gate.inflight >= gate.max_inflight {
                return;
            }
            let it = gate.admitted;
            gate.admitted += 1;
            if gate.iter_remaining[it] == 0 {
                continue;
            }
            gate.inflight += 1;
            trace!(gate = g, iteration = it, "admitted iteration");
            let released: Vec<NodeId> = {
                let gate = &mut self.gates[g];
                let mut rest = Vec::new();
                let mut freed = Vec::new();
                for n in gate.parked.drain(..) {
                    if self.gate_entry.get(&n) == Some(&(g, it)) {
                        freed.push(n);
                    } else {
                        rest.push(n);
                    }
                }
                gate.parked = rest;
                freed
            };
            for n in released {
                if self.states[n.0] == NodeState::Pending && self.preds_remaining[n.0] == 0 {
                    self.states[n.0] = NodeState::Ready;
                    self.ready.push_back(n);
                }
            }
        }
    }
}
