//! Node execution states

/// Execution state of a DAG node.
///
/// `Completed` and `Skipped` are terminal. A skipped node propagates forward
/// exactly like a completed one for scheduling purposes, but its body never
/// runs and its writes are never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting for predecessors.
    Pending,
    /// All predecessors terminal; eligible for dispatch.
    Ready,
    /// Handed to a device executor.
    Dispatched,
    /// Finished (successfully or with a recorded failure).
    Completed,
    /// Behind an unchosen dynamic-branch guard; body never ran.
    Skipped,
}

impl NodeState {
    /// Convert from u8 (for compact storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => NodeState::Pending,
            1 => NodeState::Ready,
            2 => NodeState::Dispatched,
            3 => NodeState::Completed,
            4 => NodeState::Skipped,
            _ => NodeState::Pending,
        }
    }

    /// Convert to u8 (for compact storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            NodeState::Pending => 0,
            NodeState::Ready => 1,
            NodeState::Dispatched => 2,
            NodeState::Completed => 3,
            NodeState::Skipped => 4,
        }
    }

    /// Check whether the state is terminal.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Skipped)
    }
}
