//! Context-bounded (and unbounded) explicit-state reachability.

use std::collections::VecDeque;

use ahash::AHashSet;
use log::{debug, info, trace};

use crate::analyzer::{Analyzer, Metrics, Verdict};
use crate::config::{ExplicitState, TaggedState, VisibleState};
use crate::generator::GeneratorTable;
use crate::pds::{Letter, StackOp, SystemDescriptor, ThreadVisibleState};

/// Reached configurations per round, sliced by shared control state. Each
/// innermost vector is an antichain: a configuration appears in at most one
/// round, the lowest at which it was discovered.
type RoundTable = Vec<Vec<Vec<TaggedState>>>;

/// Inserts `tau` into round `k` unless an equal configuration is already
/// recorded at some round `<= k`. An equal configuration recorded at a
/// higher round is erased first, so the table keeps only the earliest
/// discovery. Returns true when `tau` was inserted.
fn update_round_table(
    table: &mut RoundTable,
    state_count: usize,
    k: usize,
    mut tau: TaggedState,
) -> bool {
    while table.len() <= k {
        table.push(vec![Vec::new(); state_count]);
    }
    let q = tau.cfg.state as usize;
    if (0..=k).any(|j| table[j][q].contains(&tau)) {
        return false;
    }
    for j in k + 1..table.len() {
        table[j][q].retain(|c| c != &tau);
    }
    tau.context = k;
    table[k][q].push(tau);
    true
}

/// The explicit CUBA engine: a round-based BFS where a round boundary is a
/// context switch. Within a round only the thread that produced a
/// configuration moves; crossing into the next round every other thread
/// moves.
pub struct ExplicitCuba<'a> {
    sys: &'a SystemDescriptor,
    initial: ExplicitState,
    target: Option<VisibleState>,
    generators: GeneratorTable,
    top_r: Vec<AHashSet<VisibleState>>,
    metrics: Metrics,
    reachable_round: Option<usize>,
}

impl<'a> ExplicitCuba<'a> {
    /// `target` poses a reachability query on the visible projection of the
    /// given configuration; `None` asks for convergence only.
    pub fn new(
        sys: &'a SystemDescriptor,
        initial: ExplicitState,
        target: Option<ExplicitState>,
        generators: GeneratorTable,
    ) -> Self {
        ExplicitCuba {
            initial,
            target: target.map(|c| c.top_mapping()),
            generators,
            top_r: vec![AHashSet::new(); sys.state_count()],
            metrics: Metrics::default(),
            reachable_round: None,
            sys,
        }
    }

    /// Runs the round loop. Returns the convergence round, or `None` when
    /// the bound ran out or the target cut the search short.
    fn bounded_reachability(&mut self, k_bound: usize) -> Option<usize> {
        let state_count = self.sys.state_count();
        let mut table = RoundTable::new();
        let init = TaggedState::initial(self.initial.clone());
        update_round_table(&mut table, state_count, 0, init.clone());
        self.metrics.unique_configs = 1;

        let mut curr_level = VecDeque::from([init]);
        let mut k = 0usize;
        while k_bound == 0 || k <= k_bound {
            let mut next_level: VecDeque<TaggedState> = VecDeque::new();
            while let Some(tau) = curr_level.pop_front() {
                for succ in self.step(&tau, false) {
                    if update_round_table(&mut table, state_count, k, succ.clone()) {
                        self.metrics.unique_configs += 1;
                        trace!("round {}: {}", k, succ);
                        curr_level.push_back(succ);
                    }
                }
                for succ in self.step(&tau, true) {
                    if update_round_table(&mut table, state_count, k + 1, succ.clone()) {
                        self.metrics.unique_configs += 1;
                        trace!("round {}: {}", k + 1, succ);
                        next_level.push_back(succ);
                    }
                }
            }
            self.metrics.rounds = k;
            if next_level.is_empty() {
                let round = if k == 0 { k } else { k - 1 };
                info!("the sequences R and T(R) collapse at round {}", round);
                return Some(round);
            }
            if self.converge(&table[k], k) {
                return Some(if k == 0 { k } else { k - 1 });
            }
            if self.target.is_some() && self.reachable_round.is_some() {
                return None;
            }
            curr_level = next_level;
            k += 1;
        }
        None
    }

    /// Successors of `tau`: without a switch only the thread that produced
    /// `tau` moves (the initial configuration has no such thread); with a
    /// switch every other thread moves.
    fn step(&mut self, tau: &TaggedState, allow_switch: bool) -> Vec<TaggedState> {
        let mut successors = Vec::new();
        if allow_switch {
            for tid in 0..self.sys.thread_count() {
                if Some(tid) != tau.thread {
                    self.step_thread(tau, tid, &mut successors);
                }
            }
        } else if let Some(tid) = tau.thread {
            self.step_thread(tau, tid, &mut successors);
        }
        successors
    }

    fn step_thread(&mut self, tau: &TaggedState, tid: usize, successors: &mut Vec<TaggedState>) {
        self.metrics.image_calls += 1;
        // A thread with an empty stack has no moves.
        let Some(top) = tau.cfg.stacks[tid].peek() else {
            return;
        };
        let pda = &self.sys.pdas()[tid];
        let src = ThreadVisibleState::new(tau.cfg.state, Letter::Sym(top));
        for &rid in pda.actions_from(&src) {
            let action = &pda.actions()[rid];
            let mut stacks = tau.cfg.stacks.clone();
            match action.op {
                StackOp::Push(above, below) => {
                    stacks[tid].pop();
                    stacks[tid].push(below);
                    stacks[tid].push(above);
                }
                StackOp::Overwrite(a) => {
                    stacks[tid].overwrite(a);
                }
                StackOp::Pop => {
                    stacks[tid].pop();
                }
            }
            successors.push(TaggedState::new(
                tid,
                tau.context,
                ExplicitState::new(action.dst_state, stacks),
            ));
        }
    }

    /// Projects round `k` onto visible states and applies the stopping
    /// rule: no new visible state and all generator sets consumed.
    fn converge(&mut self, round: &[Vec<TaggedState>], k: usize) -> bool {
        let mut new_in_round = 0usize;
        for bucket in round {
            for c in bucket {
                let top = c.top_mapping();
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

    /// Detects whether `tid` can re-enter a visible state within one
    /// context with a strictly taller stack. Such a thread makes round
    /// exploration diverge, so the run is rejected up front.
    fn thread_grows_unboundedly(&self, tid: usize) -> bool {
        let pda = &self.sys.pdas()[tid];
        let mut visited = AHashSet::new();
        let mut in_trace = AHashSet::new();
        for &src in pda.sources().collect::<Vec<_>>() {
            if visited.contains(&src) {
                continue;
            }
            let mut w = vec![src.letter];
            if grows_from(self.sys, tid, src, &mut w, &mut visited, &mut in_trace) {
                return true;
            }
        }
        false
    }
}

/// One DFS branch of the growth check: simulates the stack effect of every
/// action and flags a revisit of an in-progress visible state with more
/// than one symbol left.
fn grows_from(
    sys: &SystemDescriptor,
    tid: usize,
    s: ThreadVisibleState,
    w: &mut Vec<Letter>,
    visited: &mut AHashSet<ThreadVisibleState>,
    in_trace: &mut AHashSet<ThreadVisibleState>,
) -> bool {
    visited.insert(s);
    in_trace.insert(s);
    let pda = &sys.pdas()[tid];
    for &rid in pda.actions_from(&s) {
        let action = &pda.actions()[rid];
        w.pop();
        match action.op {
            StackOp::Push(above, below) => {
                w.push(Letter::Sym(below));
                w.push(Letter::Sym(above));
            }
            StackOp::Overwrite(a) => {
                w.push(Letter::Sym(a));
            }
            StackOp::Pop => {}
        }
        let Some(&top) = w.last() else {
            continue;
        };
        let t = ThreadVisibleState::new(action.dst_state, top);
        if !visited.contains(&t) {
            if grows_from(sys, tid, t, w, visited, in_trace) {
                return true;
            }
        } else if in_trace.contains(&t) && w.len() > 1 {
            return true;
        }
    }
    in_trace.remove(&s);
    false
}

impl Analyzer for ExplicitCuba<'_> {
    fn run(&mut self, k_bound: usize) -> Verdict {
        for tid in 0..self.sys.thread_count() {
            if self.thread_grows_unboundedly(tid) {
                info!(
                    "thread {} grows its stack within one context; giving up",
                    tid
                );
                return Verdict::UnboundedStackGrowth { thread: tid };
            }
        }
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::pds::Stack;
    use crate::test_util;

    fn engine<'a>(
        sys: &'a SystemDescriptor,
        initial: &ExplicitState,
        target: Option<ExplicitState>,
    ) -> ExplicitCuba<'a> {
        let generators = GeneratorTable::build(sys, initial);
        ExplicitCuba::new(sys, initial.clone(), target, generators)
    }

    #[test]
    fn antichain_keeps_the_earliest_round_only() {
        let cfg = |state| ExplicitState::new(state, vec![Stack::from_top_to_bottom(&[0])]);
        let mut table = RoundTable::new();
        assert!(update_round_table(&mut table, 2, 2, TaggedState::new(0, 0, cfg(0))));
        // rediscovery at a later round is rejected
        assert!(!update_round_table(&mut table, 2, 3, TaggedState::new(1, 0, cfg(0))));
        assert!(table[3][0].is_empty());
        // discovery at an earlier round erases the later entry
        assert!(update_round_table(&mut table, 2, 1, TaggedState::new(1, 0, cfg(0))));
        assert!(table[2][0].is_empty());
        assert_eq!(table[1][0].len(), 1);
        assert_eq!(table[1][0][0].context, 1);
        // a different configuration is unaffected
        assert!(update_round_table(&mut table, 2, 2, TaggedState::new(0, 0, cfg(1))));
        assert_eq!(table[2][1].len(), 1);
    }

    #[test]
    fn step_gating_separates_the_producing_thread_from_the_rest() {
        let (sys, initial, _) = test_util::push_pop_toggler();
        let mut cuba = engine(&sys, &initial, None);

        let tau = TaggedState::new(0, 0, initial.clone());
        let same = cuba.step(&tau, false);
        assert!(!same.is_empty());
        assert!(same.iter().all(|s| s.thread == Some(0)));
        let switched = cuba.step(&tau, true);
        assert!(!switched.is_empty());
        assert!(switched.iter().all(|s| s.thread == Some(1)));

        // the initial configuration has no producing thread
        let init = TaggedState::initial(initial);
        assert!(cuba.step(&init, false).is_empty());
        assert_eq!(cuba.step(&init, true).len(), 3);
    }

    #[test]
    fn pop_only_collapses_immediately() {
        let (sys, initial) = test_util::pop_only();
        let mut cuba = engine(&sys, &initial, None);
        assert_eq!(cuba.run(0), Verdict::Convergent { round: 0 });
        assert_eq!(cuba.metrics().unique_configs, 2);
        // the collapse fires before round 1 is ever projected
        assert_eq!(cuba.metrics().unique_visible, 1);
        assert!(cuba.metrics().image_calls > 0);
    }

    #[test]
    fn target_witnessed_across_one_context_switch() {
        let (sys, initial, target) = test_util::push_pop_toggler();
        let mut cuba = engine(&sys, &initial, Some(target));
        assert_eq!(cuba.run(0), Verdict::TargetReachable { round: 1 });
    }

    #[test]
    fn unreachable_target_reported_after_convergence() {
        let (sys, initial) = test_util::pop_only();
        let target = ExplicitState::new(0, vec![Stack::from_top_to_bottom(&[1])]);
        let mut cuba = engine(&sys, &initial, Some(target));
        assert_eq!(cuba.run(0), Verdict::TargetUnreachable { round: 0 });
    }

    #[test]
    fn generator_exhaustion_stops_an_infinite_run() {
        // thread 0 grows its stack forever across context switches, so the
        // configuration sequence never collapses; the visible sequence does.
        let (sys, initial) = test_util::pusher_flipper();
        let mut cuba = engine(&sys, &initial, None);
        assert_eq!(cuba.run(0), Verdict::Convergent { round: 3 });
    }

    #[test]
    fn bound_exhaustion_is_reported() {
        let (sys, initial) = test_util::pusher_flipper();
        let mut cuba = engine(&sys, &initial, None);
        assert_eq!(cuba.run(2), Verdict::BoundExhausted { rounds: 2 });
    }

    #[test]
    fn unbounded_same_context_growth_is_rejected() {
        let (sys, initial) = test_util::unbounded_pusher();
        let mut cuba = engine(&sys, &initial, None);
        assert_eq!(cuba.run(0), Verdict::UnboundedStackGrowth { thread: 0 });
    }
}
