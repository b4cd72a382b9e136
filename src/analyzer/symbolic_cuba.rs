//! Context-bounded (and unbounded) symbolic reachability over store
//! automata, following the QR'05 saturation construction.

use std::collections::{BTreeSet, VecDeque};

use ahash::{AHashMap, AHashSet};
use log::{debug, info, trace};

use crate::analyzer::{Analyzer, Metrics, Verdict};
use crate::config::{ExplicitState, SymbolicState, VisibleState};
use crate::fsa::{FsaDelta, FsaState, FsaTransition, StoreAutomaton};
use crate::generator::GeneratorTable;
use crate::pds::{Letter, PdaState, StackOp, SystemDescriptor, ThreadState, ThreadVisibleState};

/// The symbolic CUBA engine. Each thread's reachable stacks are kept as a
/// store automaton; a round saturates one thread's automaton and re-anchors
/// every thread at each feasible shared state.
pub struct SymbolicCuba<'a> {
    sys: &'a SystemDescriptor,
    initial: ExplicitState,
    target: Option<VisibleState>,
    generators: GeneratorTable,
    top_r: Vec<AHashSet<VisibleState>>,
    metrics: Metrics,
    reachable_round: Option<usize>,
    // allocator for accept and intermediate automaton states
    next_id: u32,
}

impl<'a> SymbolicCuba<'a> {
    pub fn new(
        sys: &'a SystemDescriptor,
        initial: ExplicitState,
        target: Option<ExplicitState>,
        generators: GeneratorTable,
    ) -> Self {
        SymbolicCuba {
            initial,
            target: target.map(|c| c.top_mapping()),
            generators,
            top_r: vec![AHashSet::new(); sys.state_count()],
            metrics: Metrics::default(),
            reachable_round: None,
            next_id: 0,
            sys,
        }
    }

    fn fresh_interm(&mut self) -> FsaState {
        let s = FsaState::Interm(self.next_id);
        self.next_id += 1;
        s
    }

    fn fresh_accept(&mut self) -> FsaState {
        let s = FsaState::Accept(self.next_id);
        self.next_id += 1;
        s
    }

    /// Builds the store automaton recognizing exactly thread `tid`'s
    /// initial stack: a chain from the initial shared state to a fresh
    /// accept state, or a single ε edge for an empty stack.
    fn create_init_automaton(&mut self, tid: usize) -> StoreAutomaton {
        let sys = self.sys;
        let pda = &sys.pdas()[tid];
        let symbols: Vec<_> = self.initial.stacks[tid].symbols().collect();

        let accept = self.fresh_accept();
        let mut states = BTreeSet::from([accept]);
        let mut delta = FsaDelta::new();
        let mut src = FsaState::Control(self.initial.state);
        if symbols.is_empty() {
            delta
                .entry(src)
                .or_default()
                .insert(FsaTransition::new(src, accept, Letter::Epsilon));
        } else {
            for (i, &a) in symbols.iter().enumerate() {
                let dst = if i + 1 == symbols.len() {
                    accept
                } else {
                    let x = self.fresh_interm();
                    states.insert(x);
                    x
                };
                delta
                    .entry(src)
                    .or_default()
                    .insert(FsaTransition::new(src, dst, Letter::Sym(a)));
                src = dst;
            }
        }
        StoreAutomaton::new(
            states,
            pda.alphabet().clone(),
            delta,
            BTreeSet::from([FsaState::Control(self.initial.state)]),
            accept,
        )
    }

    /// Saturates `a` with thread `tid`'s actions: the resulting automaton
    /// recognizes post*(L(a)). POP actions contribute ε edges, closed
    /// transitively through a dst-indexed side table; PUSH actions thread
    /// their two symbols through a fresh auxiliary state per action;
    /// OVERWRITE actions fold in place.
    fn post_kleene(&mut self, a: &StoreAutomaton, tid: usize) -> StoreAutomaton {
        self.metrics.image_calls += 1;
        let sys = self.sys;
        let pda = &sys.pdas()[tid];

        let mut states = a.states().clone();
        let mut aux = AHashMap::new();
        for (rid, action) in pda.actions().iter().enumerate() {
            if matches!(action.op, StackOp::Push(..)) {
                let x = self.fresh_interm();
                states.insert(x);
                aux.insert(rid, x);
            }
        }

        let mut delta = FsaDelta::new();
        let mut eps_into = FsaDelta::new();
        let mut worklist: VecDeque<FsaTransition> = VecDeque::new();
        for bucket in a.transitions().values() {
            for &t in bucket {
                worklist.push_back(t);
                if t.label.is_epsilon() {
                    eps_into.entry(t.dst).or_default().insert(t);
                }
            }
        }

        while let Some(t) = worklist.pop_front() {
            if !delta.entry(t.src).or_default().insert(t) {
                continue;
            }
            let FsaState::Control(p) = t.src else {
                continue;
            };
            match t.label {
                Letter::Epsilon => {
                    // (p, ε, q) plus (q, b, q') gives (p, b, q')
                    if let Some(bucket) = delta.get(&t.dst) {
                        for u in bucket.clone() {
                            worklist.push_back(FsaTransition::new(t.src, u.dst, u.label));
                        }
                    }
                }
                Letter::Sym(a) => {
                    let src = ThreadVisibleState::new(p, Letter::Sym(a));
                    for &rid in pda.actions_from(&src) {
                        let action = &pda.actions()[rid];
                        let dst_control = FsaState::Control(action.dst_state);
                        match action.op {
                            StackOp::Pop => {
                                let e =
                                    FsaTransition::new(dst_control, t.dst, Letter::Epsilon);
                                eps_into.entry(t.dst).or_default().insert(e);
                                worklist.push_back(e);
                            }
                            StackOp::Overwrite(b) => {
                                worklist.push_back(FsaTransition::new(
                                    dst_control,
                                    t.dst,
                                    Letter::Sym(b),
                                ));
                            }
                            StackOp::Push(above, below) => {
                                let x = aux[&rid];
                                worklist.push_back(FsaTransition::new(
                                    dst_control,
                                    x,
                                    Letter::Sym(above),
                                ));
                                let lower = FsaTransition::new(x, t.dst, Letter::Sym(below));
                                if delta.entry(x).or_default().insert(lower) {
                                    // close ε edges that already reached x
                                    if let Some(eps) = eps_into.get(&x) {
                                        for e in eps.clone() {
                                            worklist.push_back(FsaTransition::new(
                                                e.src,
                                                t.dst,
                                                Letter::Sym(below),
                                            ));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let start = pda
            .states()
            .iter()
            .map(|&q| FsaState::Control(q))
            .collect();
        StoreAutomaton::new(states, a.alphabet().clone(), delta, start, a.accept())
    }

    /// The shared states a saturated automaton can be anchored at.
    fn project_q(a: &StoreAutomaton) -> Vec<PdaState> {
        a.start()
            .iter()
            .filter_map(|s| match s {
                FsaState::Control(q) => Some(*q),
                _ => None,
            })
            .collect()
    }

    /// Re-anchors all threads at shared state `q`: the active thread's
    /// saturated automaton is split down to what `q` reaches, every other
    /// thread's automaton is renamed to start at `q`.
    fn compose(
        &self,
        q: PdaState,
        saturated: &StoreAutomaton,
        automata: &[StoreAutomaton],
        active: usize,
    ) -> SymbolicState {
        let automata = automata
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if i == active {
                    anonymize_by_split(saturated, q)
                } else {
                    rename(a, q)
                }
            })
            .collect();
        SymbolicState::new(q, automata)
    }

    fn bounded_reachability(&mut self, k_bound: usize) -> Option<usize> {
        let n = self.sys.thread_count();
        let automata: Vec<_> = (0..n).map(|i| self.create_init_automaton(i)).collect();
        let cfg_i = SymbolicState::new(self.initial.state, automata);
        trace!("initial symbolic state: {}", cfg_i);

        let mut curr_level = VecDeque::from([cfg_i.clone()]);
        let mut global_r: Vec<Vec<SymbolicState>> = vec![vec![cfg_i]];
        let mut k = 0usize;
        self.converge(&global_r[0], 0);
        while k_bound == 0 || k < k_bound {
            let mut next_level: VecDeque<SymbolicState> = VecDeque::new();
            while let Some(cfg) = curr_level.pop_front() {
                for i in 0..n {
                    if cfg.automata[i].is_empty() {
                        continue;
                    }
                    let saturated = self.post_kleene(&cfg.automata[i], i);
                    for q in Self::project_q(&saturated) {
                        next_level.push_back(self.compose(q, &saturated, &cfg.automata, i));
                    }
                }
            }
            self.metrics.rounds = k;
            if self.target.is_some() && self.reachable_round.is_some() {
                return None;
            }
            curr_level = next_level;
            k += 1;
            global_r.push(curr_level.iter().cloned().collect());
            if self.converge(&global_r[k], k) {
                self.metrics.rounds = k;
                return Some(if k == 0 { k } else { k - 1 });
            }
        }
        self.metrics.rounds = k;
        None
    }

    /// Projects round `k` onto visible states; same stopping rule as the
    /// explicit engine.
    fn converge(&mut self, round: &[SymbolicState], k: usize) -> bool {
        let mut new_in_round = 0usize;
        for cfg in round {
            for top in cfg.top_mapping() {
                if self.reachable_round.is_none() && self.target.as_ref() == Some(&top) {
                    info!("target visible state {} witnessed at round {}", top, k);
                    self.reachable_round = Some(k);
                }
                if self.top_r[top.state as usize].insert(top.clone()) {
                    new_in_round += 1;
                    self.metrics.unique_visible += 1;
                    self.generators.remove(&top);
                }
            }
        }
        debug!(
            "round {}: {} new visible states, {} generator entries left",
            k,
            new_in_round,
            self.generators.len()
        );
        if new_in_round == 0 {
            if self.generators.all_empty() {
                info!("the sequence T(R) collapses at round {}", k);
                return true;
            }
            debug!("the sequence T(R) plateaus at round {}", k);
        }
        false
    }
}

/// Restricts `a` to the subgraph reachable from shared state `q`, keeping
/// the automaton private to its new owner.
fn anonymize_by_split(a: &StoreAutomaton, q: PdaState) -> StoreAutomaton {
    let anchor = FsaState::Control(q);
    let mut states = BTreeSet::new();
    let mut delta = FsaDelta::new();
    let mut worklist = VecDeque::from([anchor]);
    while let Some(s) = worklist.pop_front() {
        if !states.insert(s) {
            continue;
        }
        for &t in a.outgoing(&s) {
            delta.entry(s).or_default().insert(t);
            worklist.push_back(t.dst);
        }
    }
    // only non-control states belong to the automaton itself
    states.remove(&anchor);
    StoreAutomaton::new(
        states,
        a.alphabet().clone(),
        delta,
        BTreeSet::from([anchor]),
        a.accept(),
    )
}

/// Moves the automaton's anchor to shared state `q`, re-sourcing the start
/// state's outgoing edges. Store automata carry exactly one start state
/// between rounds.
fn rename(a: &StoreAutomaton, q: PdaState) -> StoreAutomaton {
    let anchor = FsaState::Control(q);
    let mut delta = a.transitions().clone();
    if let Some(&old) = a.start().iter().next() {
        if old != anchor {
            if let Some(bucket) = delta.remove(&old) {
                let moved = delta.entry(anchor).or_default();
                for t in bucket {
                    moved.insert(FsaTransition::new(anchor, t.dst, t.label));
                }
            }
        }
    }
    StoreAutomaton::new(
        a.states().clone(),
        a.alphabet().clone(),
        delta,
        BTreeSet::from([anchor]),
        a.accept(),
    )
}

/// Membership of one thread state in a store automaton: matches the stack
/// top-down along transitions, following ε edges without consuming, and
/// accepts at the accept state with the stack consumed.
pub fn is_recognizable(a: &StoreAutomaton, c: &ThreadState) -> bool {
    let symbols: Vec<_> = c.stack.symbols().collect();
    let mut explored = BTreeSet::new();
    let mut worklist = VecDeque::from([(FsaState::Control(c.state), 0usize)]);
    while let Some((s, depth)) = worklist.pop_front() {
        if !explored.insert((s, depth)) {
            continue;
        }
        if depth == symbols.len() && s == a.accept() {
            return true;
        }
        for t in a.outgoing(&s) {
            if t.label.is_epsilon() {
                worklist.push_back((t.dst, depth));
            } else if depth < symbols.len() && t.label == Letter::Sym(symbols[depth]) {
                worklist.push_back((t.dst, depth + 1));
            }
        }
    }
    false
}

/// Always-true placeholder for store-automaton language equivalence. Rounds
/// are never pruned against earlier rounds; convergence detection relies on
/// the visible projection instead.
pub fn is_equivalent(_a1: &StoreAutomaton, _a2: &StoreAutomaton) -> bool {
    true
}

impl Analyzer for SymbolicCuba<'_> {
    fn run(&mut self, k_bound: usize) -> Verdict {
        let convergence = self.bounded_reachability(k_bound);
        if let Some(round) = self.reachable_round {
            return Verdict::TargetReachable { round };
        }
        match (convergence, self.target.is_some()) {
            (Some(round), true) => Verdict::TargetUnreachable { round },
            (Some(round), false) => Verdict::Convergent { round },
            (None, _) => Verdict::BoundExhausted { rounds: k_bound },
        }
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn visible_states(&self) -> &[AHashSet<VisibleState>] {
        &self.top_r
    }
}
