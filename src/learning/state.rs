use std::fmt;

/// Position of the learning loop in its state machine.
///
/// ```text
/// Initializing -> PartitioningPerSample(1) -> Aggregating(1)
///     -> PartitioningPerSample(2) -> ... -> Converged | IterationCapReached
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Samples not yet validated, no error model.
    Initializing,
    /// Partitioning every sample with the current model.
    PartitioningPerSample {
        /// 1-based iteration number.
        iteration: usize,
    },
    /// Pooling counts from the finished pass into a new model.
    Aggregating {
        /// 1-based iteration number.
        iteration: usize,
    },
    /// Model change fell below tolerance.
    Converged {
        /// Iterations completed.
        iterations: usize,
    },
    /// Iteration cap reached before convergence.
    IterationCapReached {
        /// Iterations completed.
        iterations: usize,
    },
}

impl LoopState {
    /// Whether the loop has stopped learning.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Converged { .. } | LoopState::IterationCapReached { .. }
        )
    }

    /// Completed iterations for terminal states.
    pub fn iterations(&self) -> Option<usize> {
        match self {
            LoopState::Converged { iterations } | LoopState::IterationCapReached { iterations } => {
                Some(*iterations)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Initializing => write!(f, "initializing"),
            LoopState::PartitioningPerSample { iteration } => {
                write!(f, "partitioning (iteration {iteration})")
            }
            LoopState::Aggregating { iteration } => write!(f, "aggregating (iteration {iteration})"),
            LoopState::Converged { iterations } => write!(f, "converged after {iterations}"),
            LoopState::IterationCapReached { iterations } => {
                write!(f, "iteration cap reached after {iterations}")
            }
        }
    }
}
