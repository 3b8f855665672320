//! Device executors
//!
//! Both executors satisfy one contract: "execute this body, signal
//! completion". CPU bodies run on a shared rayon pool; CUDA bodies are
//! queued to per-device stream workers which hand the launch itself to an
//! injected [`KernelLauncher`] - the runtime never talks to a driver API.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Sender};

use crate::dag::NodeId;
use crate::device::{Device, KernelArg, KernelDesc, LaunchCfg};
use crate::graph::CpuFn;

/// Completion signal sent back to the scheduler's drain loop.
#[derive(Debug)]
pub struct Completion {
    /// The node whose body finished.
    pub node: NodeId,
    /// Outcome reported by the body.
    pub result: anyhow::Result<()>,
}

/// The opaque kernel launch collaborator.
///
/// Implementations own kernel compilation and the actual launch mechanism;
/// the scheduler only hands over the descriptor, configuration and bound
/// arguments and expects a synchronous outcome per stream.
pub trait KernelLauncher: Send + Sync {
    /// Launch `kernel` on `device` with the given configuration and
    /// arguments, returning once the kernel has completed on its stream.
    fn launch(
        &self,
        device: Device,
        kernel: &KernelDesc,
        cfg: &LaunchCfg,
        args: &[KernelArg],
    ) -> anyhow::Result<()>;
}

/// Default launcher installed when none is injected; rejects every launch
/// so CPU-only programs work out of the box.
#[derive(Debug, Default)]
pub struct NullLauncher;

impl KernelLauncher for NullLauncher {
    fn launch(
        &self,
        device: Device,
        kernel: &KernelDesc,
        _cfg: &LaunchCfg,
        _args: &[KernelArg],
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!(
            "no kernel launcher installed; cannot launch {} on {}",
            kernel,
            device
        ))
    }
}

/// CPU execution context: a shared thread pool.
#[derive(Debug)]
pub struct CpuExecutor {
    pool: rayon::ThreadPool,
}

impl CpuExecutor {
    /// Create a pool with `num_threads` workers.
    pub fn new(num_threads: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("tiangong-cpu-{}", i))
            .build()
            .expect("Failed to build CPU worker pool");
        Self { pool }
    }

    /// Run `body` on the pool and signal `done` when it returns.
    pub fn dispatch(&self, node: NodeId, body: CpuFn, done: Sender<Completion>) {
        self.pool.spawn(move || {
            let result = body();
            let _ = done.send(Completion { node, result });
        });
    }
}

struct StreamJob {
    node: NodeId,
    kernel: KernelDesc,
    cfg: LaunchCfg,
    args: Vec<KernelArg>,
    done: Sender<Completion>,
}

/// CUDA execution context for one device: a set of stream workers draining
/// a shared launch queue.
pub struct CudaExecutor {
    device: Device,
    jobs: Option<Sender<StreamJob>>,
    streams: Vec<thread::JoinHandle<()>>,
}

impl CudaExecutor {
    /// Create `num_streams` stream workers for `device`.
    pub fn new(device: Device, num_streams: usize, launcher: Arc<dyn KernelLauncher>) -> Self {
        let (tx, rx) = unbounded::<StreamJob>();
        let streams = (0..num_streams.max(1))
            .map(|i| {
                let rx = rx.clone();
                let launcher = launcher.clone();
                thread::Builder::new()
                    .name(format!("tiangong-cuda{}-stream-{}", device.id, i))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            let result =
                                launcher.launch(device, &job.kernel, &job.cfg, &job.args);
                            let _ = job.done.send(Completion {
                                node: job.node,
                                result,
                            });
                        }
                    })
                    .expect("Failed to spawn stream worker thread")
            })
            .collect();
        Self {
            device,
            jobs: Some(tx),
            streams,
        }
    }

    /// The device this executor serves.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Queue a kernel launch; a free stream worker picks it up.
    pub fn dispatch(
        &self,
        node: NodeId,
        kernel: KernelDesc,
        cfg: LaunchCfg,
        args: Vec<KernelArg>,
        done: Sender<Completion>,
    ) {
        let job = StreamJob {
            node,
            kernel,
            cfg,
            args,
            done,
        };
        if let Some(jobs) = &self.jobs {
            if let Err(err) = jobs.send(job) {
                let job = err.into_inner();
                let _ = job.done.send(Completion {
                    node: job.node,
                    result: Err(anyhow::anyhow!("stream workers shut down")),
                });
            }
        }
    }
}

impl Drop for CudaExecutor {
    fn drop(&mut self) {
        drop(self.jobs.take());
        for stream in self.streams.drain(..) {
            let _ = stream.join();
        }
    }
}

impl std::fmt::Debug for CudaExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaExecutor")
            .field("device", &self.device)
            .field("streams", &self.streams.len())
            .finish()
    }
}
