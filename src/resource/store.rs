//! Host-visible scalar storage
//!
//! The store is the synchronization point between device/host producers and
//! host consumers: `set_host` publishes a value, `get_blocking` parks the
//! calling thread until one is available. Buffer payload memory is not held
//! here; only scalars have host-visible cells.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use super::view::ResourceId;

/// Type alias for shared host-visible values.
pub type SyncValue = Arc<dyn Any + Send + Sync>;

/// One scalar cell: value slot plus the condvar readers park on.
#[derive(Default)]
struct ScalarCell {
    value: Mutex<Option<SyncValue>>,
    ready: Condvar,
}

/// Host-side store for scalar values.
///
/// Cells are created lazily on first access, so producers and consumers may
/// touch a scalar in either order.
#[derive(Default)]
pub struct HostStore {
    cells: RwLock<HashMap<ResourceId, Arc<ScalarCell>>>,
}

impl HostStore {
    /// Create an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a typed value for `id`, waking any blocked readers.
    ///
    /// Re-setting a scalar overwrites the previous value; resources outlive
    /// graphs and are reusable across runs.
    pub fn set_host<T: Send + Sync + 'static>(&self, id: ResourceId, value: T) {
        self.set(id, Arc::new(value) as SyncValue);
    }

    /// Publish an untyped value for `id`.
    pub fn set(&self, id: ResourceId, value: SyncValue) {
        let cell = self.cell(id);
        let mut slot = cell.value.lock();
        *slot = Some(value);
        cell.ready.notify_all();
    }

    /// Read the value of `id`, blocking until a producer has published one.
    ///
    /// Returns `None` if the stored value is not a `T`.
    pub fn get_blocking<T: Clone + Send + Sync + 'static>(&self, id: ResourceId) -> Option<T> {
        let cell = self.cell(id);
        let mut slot = cell.value.lock();
        while slot.is_none() {
            cell.ready.wait(&mut slot);
        }
        let value = slot.as_ref().cloned();
        drop(slot);
        value.and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Read the value of `id` without blocking.
    pub fn try_get<T: Clone + Send + Sync + 'static>(&self, id: ResourceId) -> Option<T> {
        let cells = self.cells.read();
        let cell = cells.get(&id)?;
        let slot = cell.value.lock();
        slot.as_ref().and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Check whether a value has been published for `id`.
    pub fn is_set(&self, id: ResourceId) -> bool {
        let cells = self.cells.read();
        cells
            .get(&id)
            .map(|c| c.value.lock().is_some())
            .unwrap_or(false)
    }

    fn cell(&self, id: ResourceId) -> Arc<ScalarCell> {
        {
            let cells = self.cells.read();
            if let Some(cell) = cells.get(&id) {
                return cell.clone();
            }
        }
        let mut cells = self.cells.write();
        cells.entry(id).or_default().clone()
    }
}

impl std::fmt::Debug for HostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells = self.cells.read();
        f.debug_struct("HostStore")
            .field("cells", &cells.len())
            .finish()
    }
}
