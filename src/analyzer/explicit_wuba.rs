//! Write-bounded (and unbounded) explicit-state reachability: rounds are
//! bounded by writes to the shared state instead of context switches.

use std::collections::VecDeque;

use ahash::AHashSet;
use log::{debug, info, trace};

use crate::analyzer::{Analyzer, Metrics, Verdict};
use crate::config::{ExplicitState, VisibleState};
use crate::generator::GeneratorTable;
use crate::pds::{Letter, StackOp, SystemDescriptor, ThreadVisibleState};

type RoundTable = Vec<Vec<Vec<ExplicitState>>>;

/// Same antichain discipline as the context-bounded engine, over untagged
/// configurations: a configuration lives at the lowest write round that
/// discovered it.
fn update_round_table(
    table: &mut RoundTable,
    state_count: usize,
    k: usize,
    tau: ExplicitState,
) -> bool {
    while table.len() <= k {
        table.push(vec![Vec::new(); state_count]);
    }
    let q = tau.state as usize;
    if (0..=k).any(|j| table[j][q].contains(&tau)) {
        return false;
    }
    for j in k + 1..table.len() {
        table[j][q].retain(|c| c != &tau);
    }
    table[k][q].push(tau);
    true
}

/// The explicit WUBA engine. Any thread may move at any time; successors
/// that keep the shared state stay in the current round, successors that
/// write it move to the next. Collapse of the configuration sequence and of
/// its visible projection are recorded separately; either ends an unbounded
/// run.
pub struct ExplicitWuba<'a> {
    sys: &'a SystemDescriptor,
    initial: ExplicitState,
    generators: GeneratorTable,
    top_r: Vec<AHashSet<VisibleState>>,
    metrics: Metrics,
    convergence_gs: Option<usize>,
    convergence_vs: Option<usize>,
}

impl<'a> ExplicitWuba<'a> {
    pub fn new(
        sys: &'a SystemDescriptor,
        initial: ExplicitState,
        generators: GeneratorTable,
    ) -> Self {
        ExplicitWuba {
            initial,
            generators,
            top_r: vec![AHashSet::new(); sys.state_count()],
            metrics: Metrics::default(),
            convergence_gs: None,
            convergence_vs: None,
            sys,
        }
    }

    /// First round at which the configuration sequence collapsed, and first
    /// round at which its visible projection collapsed.
    pub fn collapse_rounds(&self) -> (Option<usize>, Option<usize>) {
        (self.convergence_gs, self.convergence_vs)
    }

    fn k_bounded_reachability(&mut self, k_bound: usize) -> Option<usize> {
        let state_count = self.sys.state_count();
        let mut table = RoundTable::new();
        update_round_table(&mut table, state_count, 0, self.initial.clone());
        self.metrics.unique_configs = 1;

        let mut curr_round = VecDeque::from([self.initial.clone()]);
        let mut k = 0usize;
        while k_bound == 0 || k <= k_bound {
            let mut next_round: VecDeque<ExplicitState> = VecDeque::new();
            while let Some(tau) = curr_round.pop_front() {
                for succ in self.step(&tau) {
                    if succ.state == tau.state {
                        // no write: the successor belongs to this round
                        if update_round_table(&mut table, state_count, k, succ.clone()) {
                            self.metrics.unique_configs += 1;
                            trace!("write round {}: {}", k, succ);
                            curr_round.push_back(succ);
                        }
                    } else if update_round_table(&mut table, state_count, k + 1, succ.clone()) {
                        self.metrics.unique_configs += 1;
                        trace!("write round {}: {}", k + 1, succ);
                        next_round.push_back(succ);
                    }
                }
            }
            self.metrics.rounds = k;
            if self.convergence_gs.is_none() && next_round.is_empty() {
                let round = if k == 0 { k } else { k - 1 };
                info!("the sequences R and T(R) collapse at write round {}", round);
                self.convergence_gs = Some(round);
            }
            let row = table.get(k).map(Vec::as_slice).unwrap_or(&[]);
            if self.converge(row, k) && self.convergence_vs.is_none() {
                let round = if k == 0 { k } else { k - 1 };
                info!("the sequence T(R) collapses at write round {}", round);
                self.convergence_vs = Some(round);
            }
            if k_bound == 0 && (self.convergence_gs.is_some() || self.convergence_vs.is_some()) {
                return match (self.convergence_gs, self.convergence_vs) {
                    (Some(gs), Some(vs)) => Some(gs.min(vs)),
                    (gs, vs) => gs.or(vs),
                };
            }
            curr_round = next_round;
            k += 1;
        }
        None
    }

    /// Successors of `tau` across all threads; write rounds impose no
    /// thread gating.
    fn step(&mut self, tau: &ExplicitState) -> Vec<ExplicitState> {
        let mut successors = Vec::new();
        for tid in 0..self.sys.thread_count() {
            self.metrics.image_calls += 1;
            let Some(top) = tau.stacks[tid].peek() else {
                continue;
            };
            let pda = &self.sys.pdas()[tid];
            let src = ThreadVisibleState::new(tau.state, Letter::Sym(top));
            for &rid in pda.actions_from(&src) {
                let action = &pda.actions()[rid];
                let mut stacks = tau.stacks.clone();
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
                successors.push(ExplicitState::new(action.dst_state, stacks));
            }
        }
        successors
    }

    fn converge(&mut self, round: &[Vec<ExplicitState>], k: usize) -> bool {
        let mut new_in_round = 0usize;
        for bucket in round {
            for c in bucket {
                let top = c.top_mapping();
                if self.top_r[top.state as usize].insert(top.clone()) {
                    new_in_round += 1;
                    self.metrics.unique_visible += 1;
                    self.generators.remove(&top);
                }
            }
        }
        debug!(
            "write round {}: {} new visible states, {} generator entries left",
            k,
            new_in_round,
            self.generators.len()
        );
        if new_in_round == 0 {
            if self.generators.all_empty() {
                return true;
            }
            debug!("the sequence T(R) plateaus at write round {}", k);
        }
        false
    }
}

impl Analyzer for ExplicitWuba<'_> {
    fn run(&mut self, k_bound: usize) -> Verdict {
        match self.k_bounded_reachability(k_bound) {
            Some(round) => Verdict::Convergent { round },
            None => Verdict::BoundExhausted { rounds: k_bound },
        }
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn visible_states(&self) -> &[AHashSet<VisibleState>] {
        &self.top_r
    }
}
