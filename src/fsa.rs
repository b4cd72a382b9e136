//! Private module for selective re-export.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::pds::{Letter, PdaState};

/// A state of a store automaton. Control states are shared with the PDS;
/// accept and intermediate states are allocated by the symbolic engine and
/// tagged explicitly rather than recognized by id range.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FsaState {
    /// A shared control state of the PDS.
    Control(PdaState),
    /// An accepting state.
    Accept(u32),
    /// An intermediate state introduced by saturation.
    Interm(u32),
}

// Control states order below accept states, accept states below interms.
impl Ord for FsaState {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for FsaState {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FsaState {
    fn rank(&self) -> (u8, u32) {
        match *self {
            FsaState::Control(q) => (0, q),
            FsaState::Accept(i) => (1, i),
            FsaState::Interm(i) => (2, i),
        }
    }
}

impl fmt::Display for FsaState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FsaState::Control(q) => write!(f, "q{}", q),
            FsaState::Accept(i) => write!(f, "f{}", i),
            FsaState::Interm(i) => write!(f, "x{}", i),
        }
    }
}

/// A transition `(src, label, dst)` of a store automaton. Labels are stack
/// letters; ε labels arise from saturating POP actions.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FsaTransition {
    pub src: FsaState,
    pub dst: FsaState,
    pub label: Letter,
}

impl FsaTransition {
    pub fn new(src: FsaState, dst: FsaState, label: Letter) -> Self {
        FsaTransition { src, dst, label }
    }
}

impl fmt::Display for FsaTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.src, self.label, self.dst)
    }
}

/// Transitions indexed by source state.
pub type FsaDelta = BTreeMap<FsaState, BTreeSet<FsaTransition>>;

/// A finite automaton over stack letters with a start set and a single
/// accept state. `states` holds only the accept and intermediate states;
/// control states live in the PDS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiniteAutomaton {
    pub states: BTreeSet<FsaState>,
    pub alphabet: BTreeSet<u32>,
    pub transitions: FsaDelta,
    pub start: BTreeSet<FsaState>,
    pub accept: FsaState,
}

impl FiniteAutomaton {
    pub fn new(
        states: BTreeSet<FsaState>,
        alphabet: BTreeSet<u32>,
        transitions: FsaDelta,
        start: BTreeSet<FsaState>,
        accept: FsaState,
    ) -> Self {
        FiniteAutomaton {
            states,
            alphabet,
            transitions,
            start,
            accept,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Outgoing transitions of `s`, empty when `s` has none.
    pub fn outgoing(&self, s: &FsaState) -> impl Iterator<Item = &FsaTransition> {
        self.transitions.get(s).into_iter().flatten()
    }
}

impl fmt::Display for FiniteAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for bucket in self.transitions.values() {
            for t in bucket {
                writeln!(f, "  {}", t)?;
            }
        }
        Ok(())
    }
}

/// A store automaton: recognizes the set of stack contents a thread can
/// reach, read top first from a control state down to the accept state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreAutomaton {
    fsa: FiniteAutomaton,
}

impl StoreAutomaton {
    pub fn new(
        states: BTreeSet<FsaState>,
        alphabet: BTreeSet<u32>,
        transitions: FsaDelta,
        start: BTreeSet<FsaState>,
        accept: FsaState,
    ) -> Self {
        StoreAutomaton {
            fsa: FiniteAutomaton::new(states, alphabet, transitions, start, accept),
        }
    }

    pub fn states(&self) -> &BTreeSet<FsaState> {
        &self.fsa.states
    }

    pub fn alphabet(&self) -> &BTreeSet<u32> {
        &self.fsa.alphabet
    }

    pub fn transitions(&self) -> &FsaDelta {
        &self.fsa.transitions
    }

    pub fn start(&self) -> &BTreeSet<FsaState> {
        &self.fsa.start
    }

    pub fn accept(&self) -> FsaState {
        self.fsa.accept
    }

    pub fn is_empty(&self) -> bool {
        self.fsa.is_empty()
    }

    pub fn outgoing(&self, s: &FsaState) -> impl Iterator<Item = &FsaTransition> {
        self.fsa.outgoing(s)
    }

    /// The letters reachable as top of stack from control state `q`,
    /// following ε transitions through the automaton. An ε label in the
    /// result stands for a possibly-empty stack.
    pub fn tops_from(&self, q: PdaState) -> BTreeSet<Letter> {
        let mut tops = BTreeSet::new();
        let mut explored = BTreeSet::new();
        let mut worklist = VecDeque::new();
        worklist.push_back(FsaState::Control(q));
        while let Some(s) = worklist.pop_front() {
            if !explored.insert(s) {
                continue;
            }
            for t in self.outgoing(&s) {
                if t.label.is_epsilon() {
                    worklist.push_back(t.dst);
                }
                tops.insert(t.label);
            }
        }
        tops
    }
}

impl fmt::Display for StoreAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fsa.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pds::Letter::{Epsilon, Sym};

    fn delta(transitions: &[FsaTransition]) -> FsaDelta {
        let mut map = FsaDelta::new();
        for &t in transitions {
            map.entry(t.src).or_default().insert(t);
        }
        map
    }

    #[test]
    fn state_ordering_puts_control_before_accept_before_interm() {
        assert!(FsaState::Control(9) < FsaState::Accept(0));
        assert!(FsaState::Accept(9) < FsaState::Interm(0));
        assert!(FsaState::Control(0) < FsaState::Control(1));
    }

    #[test]
    fn tops_follow_epsilon_closure() {
        let acc = FsaState::Accept(0);
        let x = FsaState::Interm(1);
        let a = StoreAutomaton::new(
            [acc, x].into_iter().collect(),
            [0, 1].into_iter().collect(),
            delta(&[
                FsaTransition::new(FsaState::Control(0), acc, Sym(0)),
                FsaTransition::new(FsaState::Control(0), x, Epsilon),
                FsaTransition::new(x, acc, Sym(1)),
            ]),
            [FsaState::Control(0)].into_iter().collect(),
            acc,
        );
        let tops = a.tops_from(0);
        let expected: BTreeSet<_> = [Sym(0), Sym(1), Epsilon].into_iter().collect();
        assert_eq!(tops, expected);
        assert!(a.tops_from(1).is_empty());
    }
}
