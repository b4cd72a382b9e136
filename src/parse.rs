//! Private module for selective re-export.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::debug;

use crate::config::ExplicitState;
use crate::error::CubaError;
use crate::pds::{
    Letter, PdaAction, PdaAlpha, PdaState, PushdownAutomaton, Stack, StackOp, SystemDescriptor,
    ThreadVisibleState,
};

/// Parses a concurrent pushdown system from its textual description.
///
/// The format:
/// - `#` starts a comment, anywhere on a line;
/// - the first token is the shared control-state count `S` (states `0..S`);
/// - each `PDA lo hi` line opens a thread block whose stack alphabet is the
///   inclusive range `lo..=hi`;
/// - each following `s1 l1 -> s2 [l2 [l3]]` line is one action of the open
///   block: both `l2` and `l3` present is a push (`l2` ends on top), only
///   `l2` an overwrite, neither (or `-`) a pop.
pub fn parse_cpds(text: &str) -> Result<SystemDescriptor, CubaError> {
    let mut lines = text
        .lines()
        .map(|line| match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        })
        .filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| CubaError::MalformedSystem("empty description".into()))?;
    let mut header_tokens = header.split_whitespace();
    let state_count: usize = header_tokens
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| CubaError::MalformedSystem(format!("bad state count line `{}`", header)))?;
    if header_tokens.next().is_some() {
        return Err(CubaError::MalformedSystem(format!(
            "trailing tokens after state count in `{}`",
            header
        )));
    }
    if state_count == 0 {
        return Err(CubaError::NoControlStates);
    }

    let states: BTreeSet<PdaState> = (0..state_count as PdaState).collect();
    let mut blocks: Vec<(BTreeSet<PdaAlpha>, Vec<PdaAction>)> = Vec::new();
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens[0] == "PDA" {
            blocks.push((parse_alphabet(&tokens, line)?, Vec::new()));
            continue;
        }
        let block = blocks.last_mut().ok_or_else(|| {
            CubaError::MalformedSystem(format!("action `{}` precedes any PDA block", line))
        })?;
        block.1.push(parse_action(&tokens, line, state_count)?);
    }
    if blocks.is_empty() {
        return Err(CubaError::MalformedSystem("no PDA blocks".into()));
    }

    debug!(
        "parsed CPDS: {} shared states, {} threads, {} actions",
        state_count,
        blocks.len(),
        blocks.iter().map(|b| b.1.len()).sum::<usize>(),
    );
    let pdas = blocks
        .into_iter()
        .map(|(alphabet, actions)| PushdownAutomaton::new(states.clone(), alphabet, actions))
        .collect();
    Ok(SystemDescriptor::new(state_count, pdas))
}

/// Reads and parses a CPDS description file.
pub fn parse_cpds_file<P: AsRef<Path>>(path: P) -> Result<SystemDescriptor, CubaError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| CubaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_cpds(&text)
}

fn parse_alphabet(tokens: &[&str], line: &str) -> Result<BTreeSet<PdaAlpha>, CubaError> {
    if tokens.len() != 3 {
        return Err(CubaError::MalformedSystem(format!(
            "bad PDA block header `{}`",
            line
        )));
    }
    let lo: PdaAlpha = parse_num(tokens[1], line)?;
    let hi: PdaAlpha = parse_num(tokens[2], line)?;
    if lo > hi {
        return Err(CubaError::MalformedSystem(format!(
            "empty alphabet range in `{}`",
            line
        )));
    }
    Ok((lo..=hi).collect())
}

fn parse_action(tokens: &[&str], line: &str, state_count: usize) -> Result<PdaAction, CubaError> {
    if tokens.len() < 4 || tokens.len() > 6 || tokens[2] != "->" {
        return Err(CubaError::MalformedSystem(format!("bad action `{}`", line)));
    }
    let s1 = parse_state(tokens[0], line, state_count)?;
    let l1 = parse_letter(tokens[1], line)?;
    let s2 = parse_state(tokens[3], line, state_count)?;
    let op = match (tokens.get(4), tokens.get(5)) {
        (Some(&l2), Some(&l3)) => match (parse_letter(l2, line)?, parse_letter(l3, line)?) {
            (Letter::Sym(above), Letter::Sym(below)) => StackOp::Push(above, below),
            _ => {
                return Err(CubaError::MalformedSystem(format!(
                    "push with ε symbol in `{}`",
                    line
                )))
            }
        },
        (Some(&l2), None) => match parse_letter(l2, line)? {
            Letter::Sym(a) => StackOp::Overwrite(a),
            Letter::Epsilon => StackOp::Pop,
        },
        _ => StackOp::Pop,
    };
    Ok(PdaAction::new(ThreadVisibleState::new(s1, l1), s2, op))
}

fn parse_state(token: &str, line: &str, state_count: usize) -> Result<PdaState, CubaError> {
    let s: PdaState = parse_num(token, line)?;
    if s as usize >= state_count {
        return Err(CubaError::MalformedSystem(format!(
            "undeclared control state {} in `{}`",
            s, line
        )));
    }
    Ok(s)
}

fn parse_letter(token: &str, line: &str) -> Result<Letter, CubaError> {
    if token == "-" {
        return Ok(Letter::Epsilon);
    }
    Ok(Letter::Sym(parse_num(token, line)?))
}

fn parse_num<T: std::str::FromStr>(token: &str, line: &str) -> Result<T, CubaError> {
    token
        .parse()
        .map_err(|_| CubaError::MalformedSystem(format!("bad number `{}` in `{}`", token, line)))
}

/// Parses an explicit configuration `"q|w1,w2,..."` against a system: one
/// `.`-separated stack per thread, `-` for an empty stack. Stack symbols are
/// pushed left to right, so the last symbol listed ends on top.
///
/// A string without a `|` is taken as the path of a file whose first
/// non-empty line holds the configuration.
pub fn parse_explicit_state(
    s: &str,
    sys: &SystemDescriptor,
) -> Result<ExplicitState, CubaError> {
    if !s.contains('|') {
        let text = fs::read_to_string(s).map_err(|source| CubaError::Io {
            path: s.into(),
            source,
        })?;
        let line = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| CubaError::MalformedConfig(s.into()))?;
        return parse_explicit_state(line.trim(), sys);
    }
    let (state_part, stacks_part) = s
        .split_once('|')
        .ok_or_else(|| CubaError::MalformedConfig(s.into()))?;
    let state: PdaState = state_part
        .trim()
        .parse()
        .map_err(|_| CubaError::MalformedConfig(s.into()))?;
    if state as usize >= sys.state_count() {
        return Err(CubaError::MalformedConfig(s.into()));
    }
    let mut stacks = Vec::new();
    for part in stacks_part.split(',') {
        let part = part.trim();
        let mut stack = Stack::new();
        if part != "-" {
            for symbol in part.split('.') {
                let a: PdaAlpha = symbol
                    .trim()
                    .parse()
                    .map_err(|_| CubaError::MalformedConfig(s.into()))?;
                stack.push(a);
            }
        }
        stacks.push(stack);
    }
    if stacks.len() != sys.thread_count() {
        return Err(CubaError::MalformedConfig(s.into()));
    }
    Ok(ExplicitState::new(state, stacks))
}

/// The default initial configuration `"0|0,0,...,0"`: shared state 0 and
/// every stack holding the single symbol 0.
pub fn default_initial(sys: &SystemDescriptor) -> ExplicitState {
    ExplicitState::new(
        0,
        (0..sys.thread_count())
            .map(|_| Stack::from_top_to_bottom(&[0]))
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    const TOY: &str = "\
# two threads over two shared states
2
PDA 0 1
0 0 -> 1 0 0   # push
1 1 -> 0       # pop
PDA 0 1
1 0 -> 0 1     # overwrite
0 1 -> 0 -     # pop, epsilon spelling
";

    #[test]
    fn parses_blocks_and_operation_kinds() {
        let sys = parse_cpds(TOY).unwrap();
        assert_eq!(sys.state_count(), 2);
        assert_eq!(sys.thread_count(), 2);
        let a = &sys.pdas()[0];
        assert_eq!(a.alphabet().len(), 2);
        assert_eq!(a.actions()[0].op, StackOp::Push(0, 0));
        assert_eq!(a.actions()[0].dst_state, 1);
        assert_eq!(a.actions()[1].op, StackOp::Pop);
        let b = &sys.pdas()[1];
        assert_eq!(b.actions()[0].op, StackOp::Overwrite(1));
        assert_eq!(b.actions()[1].op, StackOp::Pop);
    }

    #[test]
    fn rejects_undeclared_states_and_stray_actions() {
        assert!(matches!(
            parse_cpds("2\nPDA 0 0\n0 0 -> 5\n"),
            Err(CubaError::MalformedSystem(_))
        ));
        assert!(matches!(
            parse_cpds("2\n0 0 -> 1\n"),
            Err(CubaError::MalformedSystem(_))
        ));
        assert!(matches!(parse_cpds("0\n"), Err(CubaError::NoControlStates)));
        assert!(matches!(
            parse_cpds("# only comments\n"),
            Err(CubaError::MalformedSystem(_))
        ));
    }

    #[test]
    fn parses_configurations() {
        let sys = parse_cpds(TOY).unwrap();
        let cfg = parse_explicit_state("1|0.1,-", &sys).unwrap();
        assert_eq!(cfg.state, 1);
        // symbols are pushed left to right: 1 ends on top
        assert_eq!(cfg.stacks[0].symbols().collect::<Vec<_>>(), vec![1, 0]);
        assert!(cfg.stacks[1].is_empty());

        assert!(parse_explicit_state("1|0", &sys).is_err()); // one stack missing
        assert!(parse_explicit_state("7|0,0", &sys).is_err()); // undeclared state
        assert!(matches!(
            parse_explicit_state("no-such-file", &sys), // no `|`: read as a path
            Err(CubaError::Io { .. })
        ));
    }

    #[test]
    fn configuration_can_come_from_a_file() {
        let sys = parse_cpds(TOY).unwrap();
        let path = std::env::temp_dir().join("cuba_parse_test_cfg");
        std::fs::write(&path, "\n  1|0.1,-\n").unwrap();
        let cfg = parse_explicit_state(path.to_str().unwrap(), &sys).unwrap();
        assert_eq!(cfg, parse_explicit_state("1|0.1,-", &sys).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn default_initial_covers_every_thread() {
        let sys = parse_cpds(TOY).unwrap();
        let cfg = default_initial(&sys);
        assert_eq!(cfg, parse_explicit_state("0|0,0", &sys).unwrap());
    }
}
