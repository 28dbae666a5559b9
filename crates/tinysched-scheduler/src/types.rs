use std::fmt;

/// Result of a successful placement decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleResult {
    /// Name of the selected node
    pub suggested_host: String,
    /// Number of nodes that passed filtering
    pub feasible_nodes: usize,
}

/// Score assigned to a node by one plugin, or the sum across plugins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeScore {
    pub node_name: String,
    pub score: i64,
}

impl NodeScore {
    pub fn new(node_name: impl Into<String>, score: i64) -> Self {
        Self {
            node_name: node_name.into(),
            score,
        }
    }
}

/// Why a queued pod was not attempted this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Deletion has been requested
    Terminating,
    /// Already bound by us and waiting for the observed state to catch up
    AlreadyAssumed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Terminating => write!(f, "pod is terminating"),
            SkipReason::AlreadyAssumed => write!(f, "pod is already assumed"),
        }
    }
}

/// Terminal state of a single scheduling attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Skipped(SkipReason),
    Bound(ScheduleResult),
}

/// Summary of one pass over the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pods in the queue after refresh
    pub queued: usize,
    pub bound: usize,
    pub skipped: usize,
    pub failed: usize,
}
