//! Node state definitions.

use std::fmt;

/// Node operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Built, background tasks not yet running.
    Starting,
    /// Pollers and the gap refresher are running.
    Running,
    /// Shutdown signalled, tasks being stopped.
    ShuttingDown,
    /// All background tasks stopped.
    Stopped,
}

impl NodeState {
    /// Check if background tasks are running.
    pub fn is_running(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    /// Check if the node is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Stopped)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Starting => "starting",
            NodeState::Running => "running",
            NodeState::ShuttingDown => "shutting-down",
            NodeState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
