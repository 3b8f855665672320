//! Structured-block builder scopes
//!
//! Callers drive graph construction through scoped context objects: a
//! [`SeqScope`] or [`ParScope`] is passed into a block-building closure and
//! appends children to its block in call order. Tasks accept bindings until
//! the closure that received them returns; afterwards they are sealed.

use std::ops::{Deref, DerefMut};

use crate::device::{Device, KernelArg, KernelDesc, LaunchCfg};
use crate::error::RuntimeError;
use crate::resource::{Resource, Scalar, Token, View};

use super::block::{BlockId, BlockKind, ChildRef, LoopOptions};
use super::task::{Access, AccessMode, TaskBody, TaskHandle};
use super::Graph;

/// A branch predicate: resolved at build time (host bool) or at run time
/// (scalar slot).
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    /// Host-known value; the losing branch is pruned at build time.
    Host(bool),
    /// Device/host scalar; both branches are built and selection defers to
    /// the scheduler.
    Device(View),
}

/// Conversion into a [`Predicate`], so `if_` accepts both forms.
pub trait IntoPredicate {
    /// Convert into a predicate.
    fn into_predicate(self) -> Predicate;
}

impl IntoPredicate for bool {
    #[inline]
    fn into_predicate(self) -> Predicate {
        Predicate::Host(self)
    }
}

impl IntoPredicate for &Scalar<bool> {
    #[inline]
    fn into_predicate(self) -> Predicate {
        Predicate::Device(self.as_view())
    }
}

impl IntoPredicate for Predicate {
    #[inline]
    fn into_predicate(self) -> Predicate {
        self
    }
}

/// Mutable reference to an unsealed task.
///
/// Binding methods chain; the task seals when the block-building closure it
/// was created in returns.
pub struct TaskRef<'g> {
    graph: &'g mut Graph,
    handle: TaskHandle,
}

impl std::fmt::Debug for TaskRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRef").field("handle", &self.handle).finish()
    }
}

impl<'g> TaskRef<'g> {
    pub(super) fn new(graph: &'g mut Graph, handle: TaskHandle) -> Self {
        Self { graph, handle }
    }

    /// The task's stable handle, usable with
    /// [`after`](TaskRef::after) and `task_mut`.
    #[inline]
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Bind the task to a device.
    pub fn on(&mut self, device: Device) -> &mut Self {
        self.graph.task_mut_unchecked(self.handle).device = Some(device);
        self
    }

    /// Shorthand for binding to the CPU device and installing a host body.
    pub fn cpu<F>(&mut self, body: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let task = self.graph.task_mut_unchecked(self.handle);
        task.body = Some(TaskBody::Cpu(std::sync::Arc::new(body)));
        if task.device.is_none() {
            task.device = Some(Device::cpu());
        }
        self
    }

    /// Install a kernel body with its launch configuration and bound args.
    pub fn cuda(&mut self, kernel: KernelDesc, cfg: LaunchCfg, args: Vec<KernelArg>) -> &mut Self {
        let task = self.graph.task_mut_unchecked(self.handle);
        task.body = Some(TaskBody::Cuda { kernel, cfg, args });
        self
    }

    /// Declare a read access.
    pub fn reads<R: Resource + ?Sized>(&mut self, resource: &R) -> &mut Self {
        self.access(resource.as_view(), AccessMode::Read)
    }

    /// Declare a write access.
    pub fn writes<R: Resource + ?Sized>(&mut self, resource: &R) -> &mut Self {
        self.access(resource.as_view(), AccessMode::Write)
    }

    /// Declare a read-modify-write access.
    pub fn rw<R: Resource + ?Sized>(&mut self, resource: &R) -> &mut Self {
        self.access(resource.as_view(), AccessMode::ReadWrite)
    }

    /// Add an explicit predecessor edge, for orderings data dependencies
    /// cannot express.
    pub fn after(&mut self, handle: TaskHandle) -> &mut Self {
        debug_assert!(
            handle.inner() < self.graph.num_tasks(),
            "after() handle from a different graph"
        );
        self.graph.task_mut_unchecked(self.handle).after.push(handle);
        self
    }

    /// Mark the task as having external side effects.
    ///
    /// Shorthand for `writes(token)`.
    pub fn side_effect(&mut self, token: &Token) -> &mut Self {
        self.writes(token)
    }

    fn access(&mut self, view: View, mode: AccessMode) -> &mut Self {
        self.graph
            .task_mut_unchecked(self.handle)
            .accesses
            .push(Access::new(view, mode));
        self
    }
}

/// Context object scoped to a sequential block.
///
/// Children run in call order; the resolver chains each child's exit
/// frontier to the next child's entry frontier.
pub struct SeqScope<'g> {
    graph: &'g mut Graph,
    block: BlockId,
}

/// Context object scoped to a fork-join parallel block.
///
/// Children are unordered siblings; only declared conflicting accesses and
/// explicit `after` edges order them.
pub struct ParScope<'g> {
    graph: &'g mut Graph,
    block: BlockId,
}

/// A [`SeqScope`] with the current iteration index.
pub struct IterScope<'g> {
    seq: SeqScope<'g>,
    index: i64,
}

impl<'g> IterScope<'g> {
    /// The current iteration index.
    #[inline]
    pub fn index(&self) -> i64 {
        self.index
    }
}

impl<'g> Deref for IterScope<'g> {
    type Target = SeqScope<'g>;

    fn deref(&self) -> &Self::Target {
        &self.seq
    }
}

impl<'g> DerefMut for IterScope<'g> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.seq
    }
}

macro_rules! scope_impl {
    ($scope:ident) => {
        impl<'g> $scope<'g> {
            pub(super) fn new(graph: &'g mut Graph, block: BlockId) -> Self {
                Self { graph, block }
            }

            /// Declare a task as the next child of this block.
            pub fn task(&mut self, name: &str) -> TaskRef<'_> {
                let handle = self.graph.alloc_task(name);
                self.graph
                    .block_mut(self.block)
                    .children
                    .push(ChildRef::Task(handle));
                tracing::trace!(task = %handle, name, block = %self.block, "declared task");
                TaskRef::new(self.graph, handle)
            }

            /// Re-open a previously declared task by handle.
            ///
            /// Fails with [`RuntimeError::TaskAlreadySealed`] once the task's
            /// block scope has closed.
            pub fn task_mut(&mut self, handle: TaskHandle) -> Result<TaskRef<'_>, RuntimeError> {
                if self.graph.task(handle).sealed {
                    return Err(RuntimeError::TaskAlreadySealed { task: handle });
                }
                Ok(TaskRef::new(self.graph, handle))
            }

            /// Build a nested sequential block.
            pub fn seq(&mut self, f: impl FnOnce(&mut SeqScope<'_>)) {
                let block = self.graph.alloc_block(BlockKind::Seq);
                self.graph
                    .block_mut(self.block)
                    .children
                    .push(ChildRef::Block(block));
                let mut scope = SeqScope::new(self.graph, block);
                f(&mut scope);
                self.graph.seal_block_tasks(block);
            }

            /// Build a nested fork-join parallel block.
            pub fn par(&mut self, f: impl FnOnce(&mut ParScope<'_>)) {
                let block = self.graph.alloc_block(BlockKind::Par);
                self.graph
                    .block_mut(self.block)
                    .children
                    .push(ChildRef::Block(block));
                let mut scope = ParScope::new(self.graph, block);
                f(&mut scope);
                self.graph.seal_block_tasks(block);
            }

            /// Instantiate `body` once per iteration index in `0..n`.
            ///
            /// Each instantiation is an independent child block; the index is
            /// exposed read-only through [`IterScope::index`].
            pub fn loop_(
                &mut self,
                n: i64,
                opts: LoopOptions,
                mut body: impl FnMut(&mut IterScope<'_>),
            ) {
                let block = self.graph.alloc_block(BlockKind::Loop { opts });
                self.graph
                    .block_mut(self.block)
                    .children
                    .push(ChildRef::Block(block));
                for index in 0..n.max(0) {
                    let iter_block = self.graph.alloc_block(BlockKind::Seq);
                    self.graph
                        .block_mut(block)
                        .children
                        .push(ChildRef::Block(iter_block));
                    let mut scope = IterScope {
                        seq: SeqScope::new(self.graph, iter_block),
                        index,
                    };
                    body(&mut scope);
                    self.graph.seal_block_tasks(iter_block);
                }
            }

            /// Build a conditional.
            ///
            /// A host `bool` predicate prunes at build time: only the chosen
            /// branch closure runs, the other is never constructed. A
            /// `&Scalar<bool>` predicate builds both branches plus a branch
            /// marker; selection defers to the scheduler.
            pub fn if_<P: IntoPredicate>(
                &mut self,
                pred: P,
                then_blk: impl FnOnce(&mut SeqScope<'_>),
                else_blk: impl FnOnce(&mut SeqScope<'_>),
            ) {
                match pred.into_predicate() {
                    Predicate::Host(value) => {
                        if value {
                            self.seq(then_blk);
                        } else {
                            self.seq(else_blk);
                        }
                    }
                    Predicate::Device(view) => {
                        let branch = self.graph.alloc_block(BlockKind::Branch { pred: view });
                        self.graph
                            .block_mut(self.block)
                            .children
                            .push(ChildRef::Block(branch));

                        let then_block = self.graph.alloc_block(BlockKind::Seq);
                        self.graph
                            .block_mut(branch)
                            .children
                            .push(ChildRef::Block(then_block));
                        let mut scope = SeqScope::new(self.graph, then_block);
                        then_blk(&mut scope);
                        self.graph.seal_block_tasks(then_block);

                        let else_block = self.graph.alloc_block(BlockKind::Seq);
                        self.graph
                            .block_mut(branch)
                            .children
                            .push(ChildRef::Block(else_block));
                        let mut scope = SeqScope::new(self.graph, else_block);
                        else_blk(&mut scope);
                        self.graph.seal_block_tasks(else_block);
                    }
                }
            }
        }
    };
}

scope_impl!(SeqScope);
scope_impl!(ParScope);
