//! Node id for the executable DAG

use std::fmt;

use serde::Serialize;

/// A unique identifier for a node in the executable DAG.
///
/// Ids are arena indices, allocated in lowering order; for task nodes this
/// order coincides with declaration order, which makes it the deterministic
/// tie-break for conflict edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Returns the inner value of the node id.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}
