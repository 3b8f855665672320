//! Resource registry: identity and shape tracking
//!
//! The registry allocates resource identities, records each resource's
//! element count and answers overlap queries between views. It owns no
//! payload memory; storage for buffer contents is an external collaborator.

use crate::error::RuntimeError;

use super::view::{ResourceId, ResourceKind, View};

/// Shape record for a registered resource.
#[derive(Debug, Clone)]
struct ResourceEntry {
    kind: ResourceKind,
    name: String,
    count: usize,
}

/// Tracks resource identities and shapes for one runtime.
///
/// Ids are indices into an append-only table, so an id is never reused
/// within the registry's lifetime.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: Vec<ResourceEntry>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a resource and allocate its id.
    ///
    /// Scalars and tokens always have a count of 1 regardless of the
    /// requested count.
    pub fn create(&mut self, kind: ResourceKind, name: impl Into<String>, count: usize) -> ResourceId {
        let count = match kind {
            ResourceKind::Buffer => count,
            ResourceKind::Scalar | ResourceKind::Token => 1,
        };
        let id = ResourceId(self.entries.len() as u64);
        self.entries.push(ResourceEntry {
            kind,
            name: name.into(),
            count,
        });
        id
    }

    /// Check whether an id belongs to this registry.
    #[inline]
    pub fn contains(&self, id: ResourceId) -> bool {
        (id.0 as usize) < self.entries.len()
    }

    /// Element count of a resource.
    pub fn bounds(&self, id: ResourceId) -> Result<usize, RuntimeError> {
        self.entry(id).map(|e| e.count)
    }

    /// Kind of a resource.
    pub fn kind(&self, id: ResourceId) -> Result<ResourceKind, RuntimeError> {
        self.entry(id).map(|e| e.kind)
    }

    /// Name of a resource.
    pub fn name(&self, id: ResourceId) -> Result<&str, RuntimeError> {
        self.entry(id).map(|e| e.name.as_str())
    }

    /// Create a bounds-checked view over `[offset, offset + len)`.
    pub fn view(&self, id: ResourceId, offset: usize, len: usize) -> Result<View, RuntimeError> {
        let count = self.bounds(id)?;
        if offset + len > count {
            return Err(RuntimeError::OutOfRange {
                resource: id,
                offset,
                len,
                count,
            });
        }
        Ok(View::new(id, offset, len))
    }

    /// Create a view covering the whole resource.
    pub fn full_view(&self, id: ResourceId) -> Result<View, RuntimeError> {
        let count = self.bounds(id)?;
        Ok(View::new(id, 0, count))
    }

    /// Check whether two views reference intersecting ranges of the same
    /// resource.
    #[inline]
    pub fn overlaps(&self, a: &View, b: &View) -> bool {
        a.overlaps(b)
    }

    /// Number of registered resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: ResourceId) -> Result<&ResourceEntry, RuntimeError> {
        self.entries
            .get(id.0 as usize)
            .ok_or(RuntimeError::DanglingResource { resource: id })
    }
}
