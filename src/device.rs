//! Device identity and kernel launch descriptors
//!
//! A [`Device`] names an execution context: the host CPU pool or a CUDA
//! device selected by id. Kernel work is described by a [`KernelDesc`] plus a
//! [`LaunchCfg`] and bound arguments; the actual launch mechanism is an
//! external collaborator (see [`KernelLauncher`](crate::exec::KernelLauncher)).

use std::fmt;

use serde::Serialize;

use crate::resource::{ResourceId, View};

/// Kind of execution device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceKind {
    /// Host CPU thread pool.
    Cpu,
    /// CUDA device (future: ROCm, Vulkan, ...).
    Cuda,
}

/// An execution device.
///
/// CPU uses id 0; CUDA ids select the physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Device {
    /// Device kind.
    pub kind: DeviceKind,
    /// Device id (0 for CPU).
    pub id: u32,
}

impl Device {
    /// The host CPU device.
    #[inline]
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            id: 0,
        }
    }

    /// A CUDA device by id.
    #[inline]
    pub fn cuda(id: u32) -> Self {
        Self {
            kind: DeviceKind::Cuda,
            id,
        }
    }

    /// Check whether this is the CPU device.
    #[inline]
    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda => write!(f, "cuda:{}", self.id),
        }
    }
}

/// A three-dimensional extent for grid/block shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    /// Create an extent from explicit components.
    #[inline]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of elements covered by the extent.
    #[inline]
    pub fn volume(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl Default for Dim3 {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl From<u32> for Dim3 {
    fn from(x: u32) -> Self {
        Self { x, y: 1, z: 1 }
    }
}

impl From<(u32, u32, u32)> for Dim3 {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self { x, y, z }
    }
}

/// Kernel launch configuration: grid/block shape and dynamic shared memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LaunchCfg {
    /// Grid extent.
    pub grid: Dim3,
    /// Block extent.
    pub block: Dim3,
    /// Dynamic shared memory in bytes.
    pub shmem: usize,
}

impl LaunchCfg {
    /// A 1-D launch configuration.
    #[inline]
    pub fn linear(grid: u32, block: u32) -> Self {
        Self {
            grid: Dim3::from(grid),
            block: Dim3::from(block),
            shmem: 0,
        }
    }
}

/// Opaque descriptor naming a compiled kernel.
///
/// The runtime never interprets the symbol; it is handed verbatim to the
/// launch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelDesc {
    /// Symbol or registry key of the kernel binary.
    pub symbol: String,
}

impl KernelDesc {
    /// Create a descriptor for the given kernel symbol.
    #[inline]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for KernelDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel<{}>", self.symbol)
    }
}

/// An argument bound to a kernel launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KernelArg {
    /// A buffer sub-range.
    View(View),
    /// A scalar resource, passed by identity.
    Scalar(ResourceId),
    /// An immediate host value.
    Immediate(i64),
}
