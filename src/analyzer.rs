//! Private module for selective re-export.

mod explicit_cuba;
mod explicit_wuba;
mod symbolic_cuba;

pub use explicit_cuba::ExplicitCuba;
pub use explicit_wuba::ExplicitWuba;
pub use symbolic_cuba::{is_equivalent, is_recognizable, SymbolicCuba};

use std::fmt;

use ahash::AHashSet;
use serde::Serialize;

use crate::config::VisibleState;

/// The outcome of a reachability analysis.
///
/// Rounds follow the reporting convention of the underlying observation
/// sequence: when convergence is detected while processing round `k`, the
/// sequence already collapsed at `k - 1` (or at 0 for `k == 0`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Verdict {
    /// The observation sequence converged; every reachable visible state
    /// was witnessed within the reported round.
    Convergent { round: usize },
    /// The target visible state was witnessed in the reported round.
    TargetReachable { round: usize },
    /// The analysis converged without witnessing the target.
    TargetUnreachable { round: usize },
    /// The round bound was exhausted before convergence.
    BoundExhausted { rounds: usize },
    /// A thread can grow its stack without bound inside a single context;
    /// explicit exploration would not terminate its rounds.
    UnboundedStackGrowth { thread: usize },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Verdict::Convergent { round } => {
                write!(f, "the sequence T(R) collapses at round {}", round)
            }
            Verdict::TargetReachable { round } => {
                write!(f, "the target is reachable (witnessed at round {})", round)
            }
            Verdict::TargetUnreachable { round } => write!(
                f,
                "the target is unreachable (T(R) collapses at round {})",
                round
            ),
            Verdict::BoundExhausted { rounds } => {
                write!(f, "no convergence within {} rounds", rounds)
            }
            Verdict::UnboundedStackGrowth { thread } => write!(
                f,
                "thread {} can grow its stack unboundedly within one context",
                thread
            ),
        }
    }
}

/// Exploration counters, filled in while an [`Analyzer`] runs.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct Metrics {
    /// Number of image computations (successor expansions).
    pub image_calls: usize,
    /// Number of distinct explicit configurations recorded. Zero for the
    /// symbolic engine.
    pub unique_configs: usize,
    /// Number of distinct visible states witnessed.
    pub unique_visible: usize,
    /// Number of rounds processed.
    pub rounds: usize,
}

/// A reachability engine over a concurrent pushdown system.
pub trait Analyzer {
    /// Explores up to `k_bound` rounds; `k_bound == 0` means unbounded,
    /// running until the observation sequence collapses.
    fn run(&mut self, k_bound: usize) -> Verdict;

    /// Counters for the completed run.
    fn metrics(&self) -> &Metrics;

    /// The witnessed visible states, indexed by shared control state.
    fn visible_states(&self) -> &[AHashSet<VisibleState>];
}
