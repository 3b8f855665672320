//! Structured IR blocks
//!
//! Blocks form the intermediate representation a graph accumulates during
//! construction. They are stored in an arena and reference children by
//! index, keeping the tree trivially relocatable with no ownership cycles.

use std::fmt;

use crate::resource::View;

use super::task::TaskHandle;

/// Index of a block in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

impl BlockId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}

/// A child of a block: a task or a nested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRef {
    /// A task declared directly in the block.
    Task(TaskHandle),
    /// A nested block.
    Block(BlockId),
}

/// Options controlling loop lowering and admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    /// Allow iterations to overlap; only declared accesses and explicit
    /// edges constrain them.
    pub cross_iter_parallel: bool,
    /// Maximum concurrently in-flight iteration subtrees when
    /// `cross_iter_parallel` is set. Values below 1 behave as 1.
    pub max_inflight: usize,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            cross_iter_parallel: false,
            max_inflight: 1,
        }
    }
}

impl LoopOptions {
    /// Sequential loop (the conservative default).
    #[inline]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Cross-iteration parallel loop admitting up to `max_inflight`
    /// iterations at a time.
    #[inline]
    pub fn parallel(max_inflight: usize) -> Self {
        Self {
            cross_iter_parallel: true,
            max_inflight,
        }
    }
}

/// Kind of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Ordered children, sequential semantics.
    Seq,
    /// Unordered children, fork-join semantics.
    Par,
    /// Loop whose children are the per-iteration instantiations of its body.
    Loop {
        /// Lowering/admission options.
        opts: LoopOptions,
    },
    /// Runtime-resolved conditional; children are exactly [then, else].
    Branch {
        /// The scalar slot holding the predicate.
        pred: View,
    },
}

/// A block node in the IR arena.
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// Arena index of this block.
    pub id: BlockId,
    /// Kind and kind-specific data.
    pub kind: BlockKind,
    /// Children in declaration order.
    pub children: Vec<ChildRef>,
}

impl BlockNode {
    pub(crate) fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
        }
    }

    /// Number of direct children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}
