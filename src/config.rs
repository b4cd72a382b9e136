//! Private module for selective re-export.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::fsa::StoreAutomaton;
use crate::pds::{Letter, PdaState, Stack};

/// The visible part of a global configuration: the shared control state and
/// the top letter of each thread's stack (ε for an empty stack).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct VisibleState {
    pub state: PdaState,
    pub tops: Vec<Letter>,
}

impl VisibleState {
    pub fn new(state: PdaState, tops: Vec<Letter>) -> Self {
        VisibleState { state, tops }
    }
}

impl fmt::Display for VisibleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}|", self.state)?;
        for (i, l) in self.tops.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", l)?;
        }
        write!(f, ")")
    }
}

/// A full explicit global configuration: the shared control state and one
/// concrete stack per thread. Equality and hashing are positional over all
/// fields.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExplicitState {
    pub state: PdaState,
    pub stacks: Vec<Stack>,
}

impl ExplicitState {
    pub fn new(state: PdaState, stacks: Vec<Stack>) -> Self {
        ExplicitState { state, stacks }
    }

    /// Projects onto the visible state: the top letter of each stack, with
    /// ε for empty stacks.
    pub fn top_mapping(&self) -> VisibleState {
        VisibleState::new(
            self.state,
            self.stacks.iter().map(Stack::top_letter).collect(),
        )
    }
}

impl fmt::Display for ExplicitState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}|", self.state)?;
        for (i, w) in self.stacks.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", w)?;
        }
        write!(f, ")")
    }
}

/// An explicit configuration tagged with exploration bookkeeping: the thread
/// whose action produced it (`None` for the initial configuration) and the
/// context-switch round it was discovered in. Identity deliberately excludes
/// both tags so the antichain deduplicates on the configuration alone.
#[derive(Clone, Debug)]
pub struct TaggedState {
    pub thread: Option<usize>,
    pub context: usize,
    pub cfg: ExplicitState,
}

impl TaggedState {
    pub fn initial(cfg: ExplicitState) -> Self {
        TaggedState {
            thread: None,
            context: 0,
            cfg,
        }
    }

    pub fn new(thread: usize, context: usize, cfg: ExplicitState) -> Self {
        TaggedState {
            thread: Some(thread),
            context,
            cfg,
        }
    }

    pub fn top_mapping(&self) -> VisibleState {
        self.cfg.top_mapping()
    }
}

impl PartialEq for TaggedState {
    fn eq(&self, other: &Self) -> bool {
        self.cfg == other.cfg
    }
}

impl Eq for TaggedState {}

impl Hash for TaggedState {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.cfg.hash(hasher);
    }
}

impl fmt::Display for TaggedState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.thread {
            Some(t) => write!(f, "t{}:{}@{}", t, self.cfg, self.context),
            None => write!(f, "t*:{}@{}", self.cfg, self.context),
        }
    }
}

/// A symbolic global configuration: the shared control state and one store
/// automaton per thread, each recognizing that thread's reachable stacks.
#[derive(Clone, Debug)]
pub struct SymbolicState {
    pub state: PdaState,
    pub automata: Vec<StoreAutomaton>,
}

impl SymbolicState {
    pub fn new(state: PdaState, automata: Vec<StoreAutomaton>) -> Self {
        SymbolicState { state, automata }
    }

    /// All visible states this symbolic configuration covers: the cross
    /// product of each automaton's reachable top letters from the shared
    /// state.
    pub fn top_mapping(&self) -> Vec<VisibleState> {
        let mut rows: Vec<Vec<Letter>> = vec![Vec::new()];
        for automaton in &self.automata {
            let tops = automaton.tops_from(self.state);
            let mut next = Vec::with_capacity(rows.len() * tops.len());
            for row in &rows {
                for &top in &tops {
                    let mut extended = row.clone();
                    extended.push(top);
                    next.push(extended);
                }
            }
            rows = next;
        }
        rows.into_iter()
            .map(|tops| VisibleState::new(self.state, tops))
            .collect()
    }
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "<{}|", self.state)?;
        for a in &self.automata {
            writeln!(f, "{}", a)?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fsa::{FsaDelta, FsaState, FsaTransition};
    use crate::pds::Letter::{Epsilon, Sym};

    #[test]
    fn top_mapping_projects_empty_stacks_to_epsilon() {
        let cfg = ExplicitState::new(
            3,
            vec![Stack::from_top_to_bottom(&[1, 0]), Stack::new()],
        );
        let v = cfg.top_mapping();
        assert_eq!(v, VisibleState::new(3, vec![Sym(1), Epsilon]));
        assert_eq!(v.to_string(), "(3|1,-)");
    }

    #[test]
    fn tagged_identity_ignores_thread_and_context() {
        let cfg = ExplicitState::new(0, vec![Stack::from_top_to_bottom(&[0])]);
        let a = TaggedState::new(0, 2, cfg.clone());
        let b = TaggedState::new(1, 5, cfg.clone());
        let c = TaggedState::initial(cfg);
        assert_eq!(a, b);
        assert_eq!(a, c);
        let other = TaggedState::new(0, 2, ExplicitState::new(1, vec![Stack::new()]));
        assert_ne!(a, other);
    }

    #[test]
    fn symbolic_top_mapping_is_a_cross_product() {
        let acc = FsaState::Accept(0);
        let mut delta = FsaDelta::new();
        for (label, dst) in [(Sym(0), acc), (Sym(1), acc)] {
            delta
                .entry(FsaState::Control(0))
                .or_default()
                .insert(FsaTransition::new(FsaState::Control(0), dst, label));
        }
        let a = StoreAutomaton::new(
            [acc].into_iter().collect(),
            [0, 1].into_iter().collect(),
            delta,
            [FsaState::Control(0)].into_iter().collect(),
            acc,
        );
        let cfg = SymbolicState::new(0, vec![a.clone(), a]);
        let tops = cfg.top_mapping();
        assert_eq!(tops.len(), 4);
        assert!(tops.contains(&VisibleState::new(0, vec![Sym(0), Sym(1)])));
    }

    #[test]
    fn symbolic_top_mapping_empty_when_one_thread_is_stuck() {
        let acc = FsaState::Accept(0);
        let full = StoreAutomaton::new(
            [acc].into_iter().collect(),
            [0].into_iter().collect(),
            {
                let mut d = FsaDelta::new();
                d.entry(FsaState::Control(0)).or_default().insert(
                    FsaTransition::new(FsaState::Control(0), acc, Sym(0)),
                );
                d
            },
            [FsaState::Control(0)].into_iter().collect(),
            acc,
        );
        let stuck = StoreAutomaton::new(
            [acc].into_iter().collect(),
            [0].into_iter().collect(),
            FsaDelta::new(),
            [FsaState::Control(0)].into_iter().collect(),
            acc,
        );
        let cfg = SymbolicState::new(0, vec![full, stuck]);
        assert!(cfg.top_mapping().is_empty());
    }
}
