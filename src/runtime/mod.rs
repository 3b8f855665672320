//! Runtime facade
//!
//! The [`Runtime`] owns devices and resources, exposes graph construction
//! and the blocking `run` entry point, and ties the registry, resolver and
//! scheduler together. Resources outlive any single graph and are reusable
//! across runs.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use tracing::debug;

use crate::dag::{resolve, ExecDag};
use crate::device::{Device, DeviceKind};
use crate::error::RuntimeError;
use crate::exec::{
    CpuExecutor, CudaExecutor, ExecReport, KernelLauncher, NullLauncher, Scheduler,
    SchedulerConfig,
};
use crate::graph::Graph;
use crate::resource::{Buffer, HostStore, ResourceKind, ResourceRegistry, Scalar, Token};

/// Owner of devices, resources and execution contexts.
pub struct Runtime {
    registry: RwLock<ResourceRegistry>,
    store: Arc<HostStore>,
    launcher: Arc<dyn KernelLauncher>,
    cpu_exec: CpuExecutor,
    cuda_execs: RwLock<HashMap<u32, CudaExecutor>>,
    config: SchedulerConfig,
}

impl Runtime {
    /// Create a runtime with default configuration and no kernel launcher.
    ///
    /// CPU-only programs work out of the box; kernel launches fail until a
    /// launcher is injected via [`Runtime::with_launcher`].
    pub fn create() -> Self {
        Self::with_launcher(SchedulerConfig::default(), Arc::new(NullLauncher))
    }

    /// Create a runtime with a custom scheduler configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_launcher(config, Arc::new(NullLauncher))
    }

    /// Create a runtime with a custom configuration and kernel launch
    /// collaborator.
    pub fn with_launcher(config: SchedulerConfig, launcher: Arc<dyn KernelLauncher>) -> Self {
        Self {
            registry: RwLock::new(ResourceRegistry::new()),
            store: Arc::new(HostStore::new()),
            launcher,
            cpu_exec: CpuExecutor::new(config.cpu_threads),
            cuda_execs: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// The host CPU device.
    #[inline]
    pub fn cpu(&self) -> Device {
        Device::cpu()
    }

    /// A CUDA device by id.
    #[inline]
    pub fn cuda(&self, id: u32) -> Device {
        Device::cuda(id)
    }

    /// Register a buffer of `count` elements of `T`.
    pub fn buffer<T>(&self, name: impl Into<String>, count: usize) -> Buffer<T> {
        let id = self
            .registry
            .write()
            .create(ResourceKind::Buffer, name, count);
        Buffer::new(id, count)
    }

    /// Register a host-visible scalar of `T`.
    pub fn scalar<T: Clone + Send + Sync + 'static>(&self, name: impl Into<String>) -> Scalar<T> {
        let id = self.registry.write().create(ResourceKind::Scalar, name, 1);
        Scalar::new(id, self.store.clone())
    }

    /// Register a synchronization token.
    pub fn token(&self, name: impl Into<String>) -> Token {
        let id = self.registry.write().create(ResourceKind::Token, name, 1);
        Token::new(id)
    }

    /// Create an empty graph.
    pub fn graph(&self, name: impl Into<String>) -> Graph {
        Graph::new(name)
    }

    /// Resolve a finalized graph into its executable DAG without running it.
    ///
    /// Useful for inspection and for checking determinism of the derived
    /// edge set; `run` performs the same resolution internally.
    pub fn resolve(&self, graph: &Graph) -> Result<ExecDag, RuntimeError> {
        let registry = self.registry.read();
        resolve(graph, &registry)
    }

    /// Resolve and execute a graph, blocking until every node is terminal.
    ///
    /// Build-time errors surface before any task runs. A failing task body
    /// surfaces as [`RuntimeError::TaskFailed`] after already-dispatched
    /// work has drained.
    pub fn run(&self, graph: &Graph) -> Result<ExecReport, RuntimeError> {
        let dag = self.resolve(graph)?;
        debug!(graph = %graph.name(), nodes = dag.num_nodes(), "running graph");

        let needed: IndexSet<u32> = dag
            .nodes()
            .iter()
            .filter_map(|n| n.device())
            .filter(|d| d.kind == DeviceKind::Cuda)
            .map(|d| d.id)
            .collect();
        if !needed.is_empty() {
            let mut execs = self.cuda_execs.write();
            for id in needed {
                execs.entry(id).or_insert_with(|| {
                    CudaExecutor::new(
                        Device::cuda(id),
                        self.config.cuda_streams,
                        self.launcher.clone(),
                    )
                });
            }
        }

        let execs = self.cuda_execs.read();
        Scheduler::new(&dag, graph, &self.store, &self.cpu_exec, &execs).run()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("resources", &self.registry.read().len())
            .field("cuda_devices", &self.cuda_execs.read().len())
            .finish()
    }
}
