//! Typed resource handles
//!
//! [`Buffer`], [`Scalar`] and [`Token`] are the caller-facing capabilities
//! over registered resources. They share an identity-plus-view contract
//! through the [`Resource`] trait; dependency analysis only ever needs that
//! shared capability.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::RuntimeError;

use super::store::HostStore;
use super::view::{ResourceId, View};

/// Common capability of all resource handles: identity and a full-range view.
pub trait Resource {
    /// The resource's id.
    fn id(&self) -> ResourceId;

    /// A view covering the whole resource.
    fn as_view(&self) -> View;
}

impl Resource for View {
    #[inline]
    fn id(&self) -> ResourceId {
        self.resource
    }

    #[inline]
    fn as_view(&self) -> View {
        *self
    }
}

/// Handle to a homogeneous array of `count` elements of `T`.
///
/// The handle carries identity and shape only; payload memory is owned by an
/// external collaborator. Sub-range views keep dependency tracking precise.
#[derive(Debug)]
pub struct Buffer<T> {
    id: ResourceId,
    count: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Buffer<T> {
    pub(crate) fn new(id: ResourceId, count: usize) -> Self {
        Self {
            id,
            count,
            _marker: PhantomData,
        }
    }

    /// Element count of the buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.count
    }

    /// A bounds-checked view over `[offset, offset + count)`.
    pub fn view(&self, offset: usize, count: usize) -> Result<View, RuntimeError> {
        if offset + count > self.count {
            return Err(RuntimeError::OutOfRange {
                resource: self.id,
                offset,
                len: count,
                count: self.count,
            });
        }
        Ok(View::new(self.id, offset, count))
    }

    /// A view covering the whole buffer.
    #[inline]
    pub fn all(&self) -> View {
        View::new(self.id, 0, self.count)
    }
}

impl<T> Resource for Buffer<T> {
    #[inline]
    fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    fn as_view(&self) -> View {
        self.all()
    }
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            count: self.count,
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for Buffer<T> {}

/// Handle to a single host-visible value of `T`.
///
/// Produced values are read back with [`get_blocking`](Scalar::get_blocking);
/// constants are fed in with [`set_host`](Scalar::set_host).
pub struct Scalar<T> {
    id: ResourceId,
    store: Arc<HostStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> Scalar<T> {
    pub(crate) fn new(id: ResourceId, store: Arc<HostStore>) -> Self {
        Self {
            id,
            store,
            _marker: PhantomData,
        }
    }

    /// Read the scalar, blocking until a producer has published a value.
    pub fn get_blocking(&self) -> T {
        self.store
            .get_blocking::<T>(self.id)
            .expect("scalar value type mismatch")
    }

    /// Publish a host value, e.g. to feed a constant into a graph.
    pub fn set_host(&self, value: T) {
        self.store.set_host(self.id, value);
    }
}

impl<T> Scalar<T> {
    /// The view covering the scalar's single slot.
    #[inline]
    pub fn slot(&self) -> View {
        View::new(self.id, 0, 1)
    }
}

impl<T> Resource for Scalar<T> {
    #[inline]
    fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    fn as_view(&self) -> View {
        self.slot()
    }
}

impl<T> Clone for Scalar<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Scalar<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scalar").field("id", &self.id).finish()
    }
}

/// Pure synchronization handle with no payload.
///
/// Used to model side effects that have no natural data object (e.g. I/O):
/// a task that `writes` a token conflicts with every other task touching it.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    id: ResourceId,
}

impl Token {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self { id }
    }
}

impl Resource for Token {
    #[inline]
    fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    fn as_view(&self) -> View {
        View::new(self.id, 0, 1)
    }
}
