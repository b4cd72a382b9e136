//! Utilities for tests: small concurrent pushdown systems with known
//! reachability behavior.

use crate::config::ExplicitState;
use crate::parse::{parse_cpds, parse_explicit_state};
use crate::pds::SystemDescriptor;

/// A single thread that can only pop its lone symbol. Exploration collapses
/// immediately after the pop.
pub fn pop_only() -> (SystemDescriptor, ExplicitState) {
    let sys = parse_cpds(
        "\
1
PDA 0 0
0 0 -> 0
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0", &sys).unwrap();
    (sys, initial)
}

/// Thread 0 pushes whenever the shared state is 0, moving it to 1; thread 1
/// hands the state back. Neither thread pops, so stacks grow one symbol per
/// pair of context switches, forever.
pub fn pusher_only() -> (SystemDescriptor, ExplicitState) {
    let sys = parse_cpds(
        "\
2
PDA 0 0
0 0 -> 1 0 0
PDA 0 0
1 0 -> 0 0
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0,0", &sys).unwrap();
    (sys, initial)
}

/// Like [`pusher_only`], but thread 1 may also pop its lone symbol while the
/// shared state is 1. Thread 0 keeps growing its stack forever, while the
/// visible states stop changing once thread 1's pop has been witnessed.
pub fn pusher_flipper() -> (SystemDescriptor, ExplicitState) {
    let sys = parse_cpds(
        "\
2
PDA 0 0
0 0 -> 1 0 0
PDA 0 0
1 0 -> 0 0
1 0 -> 0
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0,0", &sys).unwrap();
    (sys, initial)
}

/// Thread 0 can push 1 over its 0, pop the 1 back off, or pop the 0 and
/// empty its stack; thread 1 toggles its own top between 0 and 1. The
/// configuration `(0|-,0)` is reachable in one context switch.
pub fn push_pop_toggler() -> (SystemDescriptor, ExplicitState, ExplicitState) {
    let sys = parse_cpds(
        "\
1
PDA 0 1
0 0 -> 0 1 0
0 1 -> 0
0 0 -> 0
PDA 0 1
0 0 -> 0 1
0 1 -> 0 0
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0,0", &sys).unwrap();
    let target = parse_explicit_state("0|-,0", &sys).unwrap();
    (sys, initial, target)
}

/// A single thread over two shared states: an overwrite moves the state
/// from 0 to 1, then a pop empties the stack without touching the state.
pub fn write_once() -> (SystemDescriptor, ExplicitState) {
    let sys = parse_cpds(
        "\
2
PDA 0 0
0 0 -> 1 0
1 0 -> 1
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0", &sys).unwrap();
    (sys, initial)
}

/// A single thread whose push loop grows the stack inside one context:
/// `(0,0)` pushes and returns to `(0,0)`. Rejected by the finite-context
/// pre-pass.
pub fn unbounded_pusher() -> (SystemDescriptor, ExplicitState) {
    let sys = parse_cpds(
        "\
1
PDA 0 0
0 0 -> 0 0 0
",
    )
    .unwrap();
    let initial = parse_explicit_state("0|0", &sys).unwrap();
    (sys, initial)
}
