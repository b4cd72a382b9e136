//! Private module for selective re-export.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::error::CubaError;

/// Identifier of a shared control state. Valid states are `0..S` for the
/// state count `S` carried by the [`SystemDescriptor`].
pub type PdaState = u32;

/// Identifier of a stack symbol.
pub type PdaAlpha = u32;

/// A stack symbol or the empty-stack marker ε.
///
/// ε orders strictly greater than every concrete symbol.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Letter {
    Sym(PdaAlpha),
    Epsilon,
}

impl Letter {
    pub fn is_epsilon(&self) -> bool {
        matches!(self, Letter::Epsilon)
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Letter::Sym(a) => write!(f, "{}", a),
            Letter::Epsilon => write!(f, "-"),
        }
    }
}

/// A pushdown stack over [`PdaAlpha`] symbols. Single-ended: all operations
/// touch the top only.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Stack {
    // Front of the deque is the top of the stack.
    items: VecDeque<PdaAlpha>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stack from symbols listed top first.
    pub fn from_top_to_bottom(symbols: &[PdaAlpha]) -> Self {
        Stack {
            items: symbols.iter().copied().collect(),
        }
    }

    /// The top symbol, or an [`CubaError::EmptyStack`] error.
    pub fn top(&self) -> Result<PdaAlpha, CubaError> {
        self.items.front().copied().ok_or(CubaError::EmptyStack)
    }

    /// The top symbol if there is one. Engines use this on their hot paths
    /// instead of [`Stack::top`].
    pub fn peek(&self) -> Option<PdaAlpha> {
        self.items.front().copied()
    }

    /// The top symbol as a [`Letter`], with ε standing for the empty stack.
    pub fn top_letter(&self) -> Letter {
        match self.items.front() {
            Some(&a) => Letter::Sym(a),
            None => Letter::Epsilon,
        }
    }

    pub fn push(&mut self, alpha: PdaAlpha) {
        self.items.push_front(alpha);
    }

    /// Removes the top symbol. Returns false on an empty stack.
    pub fn pop(&mut self) -> bool {
        self.items.pop_front().is_some()
    }

    /// Replaces the top symbol. Returns false on an empty stack.
    pub fn overwrite(&mut self, alpha: PdaAlpha) -> bool {
        match self.items.front_mut() {
            Some(top) => {
                *top = alpha;
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Symbols from top to bottom.
    pub fn symbols(&self) -> impl Iterator<Item = PdaAlpha> + '_ {
        self.items.iter().copied()
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "-");
        }
        for (i, a) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", a)?;
        }
        Ok(())
    }
}

/// The visible part of one thread: its shared control state and the letter
/// on top of its stack.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ThreadVisibleState {
    pub state: PdaState,
    pub letter: Letter,
}

impl ThreadVisibleState {
    pub fn new(state: PdaState, letter: Letter) -> Self {
        ThreadVisibleState { state, letter }
    }
}

impl fmt::Display for ThreadVisibleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.state, self.letter)
    }
}

/// One thread's full state: shared control state plus its entire stack.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ThreadState {
    pub state: PdaState,
    pub stack: Stack,
}

impl ThreadState {
    pub fn new(state: PdaState, stack: Stack) -> Self {
        ThreadState { state, stack }
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.state, self.stack)
    }
}

/// The stack effect of a PDA action.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StackOp {
    /// Replaces the matched top symbol with two symbols: the new top, then
    /// the symbol directly beneath it.
    Push(PdaAlpha, PdaAlpha),
    /// Replaces the matched top symbol.
    Overwrite(PdaAlpha),
    /// Removes the matched top symbol.
    Pop,
}

/// A single PDA transition: fires when a thread's visible state matches
/// `src`, moves the shared control state to `dst_state`, and applies `op` to
/// the thread's stack.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PdaAction {
    pub src: ThreadVisibleState,
    pub dst_state: PdaState,
    pub op: StackOp,
}

impl PdaAction {
    pub fn new(src: ThreadVisibleState, dst_state: PdaState, op: StackOp) -> Self {
        PdaAction { src, dst_state, op }
    }
}

impl fmt::Display for PdaAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.op {
            StackOp::Push(above, below) => write!(
                f,
                "{} {} -> {} {} {}",
                self.src.state, self.src.letter, self.dst_state, above, below
            ),
            StackOp::Overwrite(a) => write!(
                f,
                "{} {} -> {} {}",
                self.src.state, self.src.letter, self.dst_state, a
            ),
            StackOp::Pop => write!(
                f,
                "{} {} -> {}",
                self.src.state, self.src.letter, self.dst_state
            ),
        }
    }
}

/// One thread's pushdown automaton. Immutable once constructed: the dense
/// action list assigns every action a stable id, and `program` indexes those
/// ids by source visible state.
#[derive(Clone, Debug)]
pub struct PushdownAutomaton {
    states: BTreeSet<PdaState>,
    alphabet: BTreeSet<PdaAlpha>,
    actions: Vec<PdaAction>,
    program: BTreeMap<ThreadVisibleState, Vec<usize>>,
}

impl PushdownAutomaton {
    pub fn new(
        states: BTreeSet<PdaState>,
        alphabet: BTreeSet<PdaAlpha>,
        actions: Vec<PdaAction>,
    ) -> Self {
        let mut program: BTreeMap<ThreadVisibleState, Vec<usize>> = BTreeMap::new();
        for (rid, action) in actions.iter().enumerate() {
            program.entry(action.src).or_default().push(rid);
        }
        PushdownAutomaton {
            states,
            alphabet,
            actions,
            program,
        }
    }

    pub fn states(&self) -> &BTreeSet<PdaState> {
        &self.states
    }

    pub fn alphabet(&self) -> &BTreeSet<PdaAlpha> {
        &self.alphabet
    }

    pub fn actions(&self) -> &[PdaAction] {
        &self.actions
    }

    /// Ids of the actions enabled at `src`.
    pub fn actions_from(&self, src: &ThreadVisibleState) -> &[usize] {
        self.program.get(src).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Source visible states that enable at least one action.
    pub fn sources(&self) -> impl Iterator<Item = &ThreadVisibleState> {
        self.program.keys()
    }

    /// The letters a POP can expose as the new top: every symbol this PDA
    /// pushes beneath a new top, plus ε.
    pub fn pop_candidates(&self) -> BTreeSet<Letter> {
        let mut candidates = BTreeSet::new();
        candidates.insert(Letter::Epsilon);
        for action in &self.actions {
            if let StackOp::Push(_, below) = action.op {
                candidates.insert(Letter::Sym(below));
            }
        }
        candidates
    }
}

/// A concurrent pushdown system: `state_count` shared control states and one
/// PDA per thread. Owns everything the engines need; there is no global
/// system registry.
#[derive(Clone, Debug)]
pub struct SystemDescriptor {
    state_count: usize,
    pdas: Vec<PushdownAutomaton>,
}

impl SystemDescriptor {
    pub fn new(state_count: usize, pdas: Vec<PushdownAutomaton>) -> Self {
        SystemDescriptor { state_count, pdas }
    }

    /// Number of shared control states `S`; valid states are `0..S`.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn thread_count(&self) -> usize {
        self.pdas.len()
    }

    pub fn pdas(&self) -> &[PushdownAutomaton] {
        &self.pdas
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stack_push_pop_round_trip() {
        let mut w = Stack::new();
        assert!(w.is_empty());
        w.push(2);
        w.push(5);
        assert_eq!(w.top().unwrap(), 5);
        assert_eq!(w.len(), 2);
        assert!(w.pop());
        assert_eq!(w.top().unwrap(), 2);
        assert!(w.pop());
        assert!(!w.pop());
        assert!(matches!(w.top(), Err(CubaError::EmptyStack)));
        assert_eq!(w.top_letter(), Letter::Epsilon);
    }

    #[test]
    fn stack_overwrite_replaces_top_only() {
        let mut w = Stack::from_top_to_bottom(&[1, 0]);
        assert!(w.overwrite(3));
        assert_eq!(w.symbols().collect::<Vec<_>>(), vec![3, 0]);
        let mut empty = Stack::new();
        assert!(!empty.overwrite(3));
    }

    #[test]
    fn epsilon_orders_greater_than_every_symbol() {
        assert!(Letter::Sym(u32::MAX) < Letter::Epsilon);
        assert!(Letter::Sym(0) < Letter::Sym(1));
    }

    #[test]
    fn pop_candidates_collect_beneath_symbols_and_epsilon() {
        let actions = vec![
            PdaAction::new(
                ThreadVisibleState::new(0, Letter::Sym(0)),
                0,
                StackOp::Push(1, 0),
            ),
            PdaAction::new(ThreadVisibleState::new(0, Letter::Sym(1)), 0, StackOp::Pop),
        ];
        let pda = PushdownAutomaton::new(
            [0].into_iter().collect(),
            [0, 1].into_iter().collect(),
            actions,
        );
        let expected: BTreeSet<_> = [Letter::Sym(0), Letter::Epsilon].into_iter().collect();
        assert_eq!(pda.pop_candidates(), expected);
        assert_eq!(
            pda.actions_from(&ThreadVisibleState::new(0, Letter::Sym(0))),
            &[0]
        );
        assert!(pda
            .actions_from(&ThreadVisibleState::new(1, Letter::Sym(0)))
            .is_empty());
    }
}
