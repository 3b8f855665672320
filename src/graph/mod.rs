//! Graph IR: structured blocks plus task declarations
//!
//! A [`Graph`] accumulates an intermediate representation during
//! construction - a tree of blocks rooted at a sequential block, with tasks
//! as leaves - without computing any dependencies. Dependency resolution
//! happens later, in [`crate::dag`].
//!
//! # Architecture
//!
//! - [`TaskHandle`] / [`TaskDecl`] / [`Access`] - task declarations
//! - [`BlockId`] / [`BlockNode`] / [`BlockKind`] - the block arena
//! - [`SeqScope`] / [`ParScope`] / [`IterScope`] - builder contexts
//! - [`Graph`] - owner of both arenas

pub mod block;
pub mod builder;
pub mod task;

pub use block::{BlockId, BlockKind, BlockNode, ChildRef, LoopOptions};
pub use builder::{IntoPredicate, IterScope, ParScope, Predicate, SeqScope, TaskRef};
pub use task::{Access, AccessMode, CpuFn, TaskBody, TaskDecl, TaskHandle};

use crate::error::RuntimeError;

/// A structured program graph under construction.
///
/// The graph owns an arena of blocks and an arena of tasks; children are
/// referenced by index so the tree is trivially relocatable. The root block
/// is sequential. Once built, the IR is finalized and can be resolved into
/// an executable DAG any number of times.
#[derive(Debug)]
pub struct Graph {
    name: String,
    blocks: Vec<BlockNode>,
    tasks: Vec<TaskDecl>,
    root: BlockId,
    finalized: bool,
}

impl Graph {
    /// Create an empty graph with a sequential root block.
    pub fn new(name: impl Into<String>) -> Self {
        let root = BlockId(0);
        Self {
            name: name.into(),
            blocks: vec![BlockNode::new(root, BlockKind::Seq)],
            tasks: Vec::new(),
            root,
            finalized: false,
        }
    }

    /// The graph's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root block id.
    #[inline]
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Whether the root block has been closed.
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Build the graph's content by driving the root sequential scope.
    ///
    /// When the closure returns, every task declared directly in the root is
    /// sealed and the graph is finalized. Fails with
    /// [`RuntimeError::GraphFrozen`] if called again.
    pub fn build(&mut self, f: impl FnOnce(&mut SeqScope<'_>)) -> Result<(), RuntimeError> {
        if self.finalized {
            return Err(RuntimeError::GraphFrozen);
        }
        let root = self.root;
        let mut scope = SeqScope::new(self, root);
        f(&mut scope);
        self.seal_block_tasks(root);
        self.finalized = true;
        tracing::debug!(
            graph = %self.name,
            tasks = self.tasks.len(),
            blocks = self.blocks.len(),
            "graph finalized"
        );
        Ok(())
    }

    /// Number of declared tasks.
    #[inline]
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Number of blocks in the arena.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Look up a task declaration.
    #[inline]
    pub fn task(&self, handle: TaskHandle) -> &TaskDecl {
        &self.tasks[handle.0]
    }

    /// All task declarations in declaration order.
    #[inline]
    pub fn tasks(&self) -> &[TaskDecl] {
        &self.tasks
    }

    /// Look up a block node.
    #[inline]
    pub fn block(&self, id: BlockId) -> &BlockNode {
        &self.blocks[id.0]
    }

    pub(crate) fn alloc_task(&mut self, name: &str) -> TaskHandle {
        let handle = TaskHandle(self.tasks.len());
        self.tasks.push(TaskDecl::new(handle, name));
        handle
    }

    pub(crate) fn alloc_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BlockNode::new(id, kind));
        id
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BlockNode {
        &mut self.blocks[id.0]
    }

    pub(crate) fn task_mut_unchecked(&mut self, handle: TaskHandle) -> &mut TaskDecl {
        &mut self.tasks[handle.0]
    }

    /// Seal every task declared directly in `block`.
    ///
    /// Tasks of nested blocks were sealed when their own scopes closed.
    pub(crate) fn seal_block_tasks(&mut self, block: BlockId) {
        let handles: Vec<TaskHandle> = self
            .block(block)
            .children
            .iter()
            .filter_map(|c| match c {
                ChildRef::Task(h) => Some(*h),
                ChildRef::Block(_) => None,
            })
            .collect();
        for handle in handles {
            self.tasks[handle.0].sealed = true;
        }
    }
}
