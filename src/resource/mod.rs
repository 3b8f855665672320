//! Resources: identities, views, registry and host store
//!
//! A resource is an abstract capability named by a [`ResourceId`]. Buffers
//! support sub-range [`View`]s for precise dependency tracking, scalars are
//! single host-visible values, tokens are pure synchronization handles.
//!
//! # Architecture
//!
//! - [`ResourceId`] / [`ResourceKind`] / [`View`] - identity and sub-ranges
//! - [`ResourceRegistry`] - id allocation, shape records, overlap queries
//! - [`HostStore`] - blocking host access to scalar values
//! - [`Buffer`] / [`Scalar`] / [`Token`] - typed caller-facing handles

pub mod handle;
pub mod registry;
pub mod store;
pub mod view;

pub use handle::{Buffer, Resource, Scalar, Token};
pub use registry::ResourceRegistry;
pub use store::{HostStore, SyncValue};
pub use view::{ResourceId, ResourceKind, View};
