//! Private module for selective re-export.

use std::collections::{BTreeMap, VecDeque};

use ahash::AHashSet;
use log::{debug, info};

use crate::config::{ExplicitState, VisibleState};
use crate::pds::{Letter, PushdownAutomaton, StackOp, SystemDescriptor, ThreadVisibleState};

/// One edge of a thread's finite-machine abstraction. The destination
/// carries the letter the thread exposes after the move; `pop` marks edges
/// abstracted from POP actions.
#[derive(Clone, Copy, Debug)]
struct FsmEdge {
    dst: ThreadVisibleState,
    pop: bool,
}

/// A finite-machine abstraction of one PDA over thread visible states.
/// PUSH and OVERWRITE actions map one to one; POP actions are expanded over
/// the PDA's pop candidates, since the abstraction cannot know which symbol
/// a pop exposes.
#[derive(Clone, Debug, Default)]
struct FiniteMachine {
    edges: BTreeMap<ThreadVisibleState, Vec<FsmEdge>>,
}

impl FiniteMachine {
    fn from_pda(pda: &PushdownAutomaton) -> Self {
        let candidates = pda.pop_candidates();
        let mut edges: BTreeMap<ThreadVisibleState, Vec<FsmEdge>> = BTreeMap::new();
        for action in pda.actions() {
            let bucket = edges.entry(action.src).or_default();
            match action.op {
                StackOp::Push(above, _) => bucket.push(FsmEdge {
                    dst: ThreadVisibleState::new(action.dst_state, Letter::Sym(above)),
                    pop: false,
                }),
                StackOp::Overwrite(a) => bucket.push(FsmEdge {
                    dst: ThreadVisibleState::new(action.dst_state, Letter::Sym(a)),
                    pop: false,
                }),
                StackOp::Pop => {
                    for &letter in &candidates {
                        bucket.push(FsmEdge {
                            dst: ThreadVisibleState::new(action.dst_state, letter),
                            pop: true,
                        });
                    }
                }
            }
        }
        FiniteMachine { edges }
    }

    fn outgoing(&self, src: &ThreadVisibleState) -> &[FsmEdge] {
        self.edges.get(src).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-shared-state sets of visible states reachable through a POP move of
/// the finite-machine abstraction. The sets over-approximate the visible
/// states the real system can reach right after a pop; convergence checks
/// consume them by removal.
#[derive(Clone, Debug)]
pub struct GeneratorTable {
    sets: Vec<AHashSet<VisibleState>>,
}

impl GeneratorTable {
    /// Builds the table with a context-insensitive forward worklist fixed
    /// point over visible states, started from the initial projection.
    pub fn build(sys: &SystemDescriptor, initial: &ExplicitState) -> Self {
        let machines: Vec<_> = sys.pdas().iter().map(FiniteMachine::from_pda).collect();
        let mut sets = vec![AHashSet::new(); sys.state_count()];
        let mut approx: Vec<AHashSet<VisibleState>> = vec![AHashSet::new(); sys.state_count()];

        let mut worklist = VecDeque::new();
        worklist.push_back(initial.top_mapping());
        while let Some(c) = worklist.pop_front() {
            if !approx[c.state as usize].insert(c.clone()) {
                continue;
            }
            for (tid, machine) in machines.iter().enumerate() {
                let src = ThreadVisibleState::new(c.state, c.tops[tid]);
                for edge in machine.outgoing(&src) {
                    let mut tops = c.tops.clone();
                    tops[tid] = edge.dst.letter;
                    let successor = VisibleState::new(edge.dst.state, tops);
                    if edge.pop {
                        sets[successor.state as usize].insert(successor.clone());
                    }
                    worklist.push_back(successor);
                }
            }
        }

        for (q, set) in sets.iter().enumerate() {
            debug!("generator set for shared state {}: {} entries", q, set.len());
        }
        info!(
            "generator table built: {} entries over {} shared states, {} visible states explored",
            sets.iter().map(|s| s.len()).sum::<usize>(),
            sys.state_count(),
            approx.iter().map(|s| s.len()).sum::<usize>(),
        );
        GeneratorTable { sets }
    }

    /// Removes a witnessed visible state from its shared state's set.
    /// Returns true when the state was present.
    pub fn remove(&mut self, v: &VisibleState) -> bool {
        self.sets[v.state as usize].remove(v)
    }

    pub fn all_empty(&self) -> bool {
        self.sets.iter().all(|s| s.is_empty())
    }

    /// Total number of entries remaining across all shared states.
    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.all_empty()
    }

    pub fn set(&self, q: usize) -> &AHashSet<VisibleState> {
        &self.sets[q]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pds::Letter::{Epsilon, Sym};
    use crate::test_util;

    #[test]
    fn pop_destinations_fill_the_table() {
        let (sys, initial) = test_util::pusher_flipper();
        let table = GeneratorTable::build(&sys, &initial);
        assert_eq!(table.len(), 1);
        assert!(table
            .set(0)
            .contains(&VisibleState::new(0, vec![Sym(0), Epsilon])));
        assert!(table.set(1).is_empty());
    }

    #[test]
    fn removal_consumes_entries() {
        let (sys, initial) = test_util::pusher_flipper();
        let mut table = GeneratorTable::build(&sys, &initial);
        let witnessed = VisibleState::new(0, vec![Sym(0), Epsilon]);
        assert!(!table.all_empty());
        assert!(table.remove(&witnessed));
        assert!(!table.remove(&witnessed));
        assert!(table.all_empty());
    }

    #[test]
    fn pop_free_systems_yield_an_empty_table() {
        let (sys, initial) = test_util::pusher_only();
        let table = GeneratorTable::build(&sys, &initial);
        assert!(table.all_empty());
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn counts_sum_over_all_shared_states() {
        let (sys, initial, _) = test_util::push_pop_toggler();
        let table = GeneratorTable::build(&sys, &initial);
        assert_eq!(table.len(), table.set(0).len());
        assert!(!table.is_empty());
    }
}
