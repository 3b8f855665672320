//! TianGong (天工) Heterogeneous Runtime
//!
//! A structured task-graph runtime for heterogeneous (CPU/GPU) computation.
//! Programs are described as nested control-flow blocks - sequence,
//! fork-join parallel, loop, conditional - with declared per-task resource
//! accesses; the runtime infers a dependency DAG and drains it concurrently
//! across CPU threads and CUDA streams.
//!
//! # Example
//!
//! ```no_run
//! use tiangong::Runtime;
//!
//! let rt = Runtime::create();
//! let data = rt.buffer::<f32>("data", 1024);
//!
//! let mut g = rt.graph("pipeline");
//! g.build(|root| {
//!     root.task("fill").writes(&data).cpu(|| Ok(()));
//!     root.par(|p| {
//!         p.task("lo").reads(&data.view(0, 512).unwrap()).cpu(|| Ok(()));
//!         p.task("hi").reads(&data.view(512, 512).unwrap()).cpu(|| Ok(()));
//!     });
//! }).unwrap();
//!
//! rt.run(&g).unwrap();
//! ```
//!
//! # Crate Features
//!
//! - `debug`: extra internal consistency checks

#![doc(html_root_url = "https://docs.rs/tiangong")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod dag;
pub mod device;
pub mod error;
pub mod exec;
pub mod graph;
pub mod resource;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use device::{Device, DeviceKind, Dim3, KernelArg, KernelDesc, LaunchCfg};
pub use error::RuntimeError;
pub use exec::{ExecReport, KernelLauncher, NullLauncher, SchedulerConfig};
pub use graph::{Graph, IterScope, LoopOptions, ParScope, SeqScope, TaskHandle};
pub use resource::{Buffer, Resource, ResourceId, ResourceKind, Scalar, Token, View};
pub use runtime::Runtime;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "TianGong (天工)";
