//! A library for reachability analysis of concurrent pushdown systems:
//! finitely many threads, each a pushdown automaton, communicating through a
//! finite shared control state.
//!
//! Exploration proceeds in rounds — context switches for the CUBA engines,
//! shared-state writes for the WUBA engine — and a run is *unbounded* when
//! the round bound is 0: it keeps going until the sequence of reachable
//! visible states provably stops growing. Convergence is detected with
//! generator sets, a context-insensitive over-approximation of the visible
//! states reachable right after a pop, consumed as the exploration witnesses
//! them.
//!
//! A small example follows: one thread that can only pop its lone stack
//! symbol.
//!
//! ```rust
//! use cuba::parse::{parse_cpds, parse_explicit_state};
//! use cuba::{Analyzer, ExplicitCuba, GeneratorTable, Verdict};
//!
//! let sys = parse_cpds("\
//! 1
//! PDA 0 0
//! 0 0 -> 0
//! ").unwrap();
//! let initial = parse_explicit_state("0|0", &sys).unwrap();
//!
//! let generators = GeneratorTable::build(&sys, &initial);
//! let mut analyzer = ExplicitCuba::new(&sys, initial, None, generators);
//! assert_eq!(analyzer.run(0), Verdict::Convergent { round: 0 });
//! ```

mod analyzer;
mod config;
mod error;
mod fsa;
mod generator;
pub mod parse;
mod pds;
pub mod report;
#[cfg(test)]
pub mod test_util;

pub use analyzer::{
    is_equivalent, is_recognizable, Analyzer, ExplicitCuba, ExplicitWuba, Metrics, SymbolicCuba,
    Verdict,
};
pub use config::{ExplicitState, SymbolicState, TaggedState, VisibleState};
pub use error::CubaError;
pub use fsa::{FiniteAutomaton, FsaDelta, FsaState, FsaTransition, StoreAutomaton};
pub use generator::GeneratorTable;
pub use pds::{
    Letter, PdaAction, PdaAlpha, PdaState, PushdownAutomaton, Stack, StackOp, SystemDescriptor,
    ThreadState, ThreadVisibleState,
};
