//! Command-line front end for the analyzers: loads a concurrent pushdown
//! system from a file and runs context- or write-bounded reachability over
//! it.
//!
//! ```text
//! cuba -f sys.pds [-i "0|0,0"] [-t "0|-,0"] [-k BOUND] [-r C|W] [-x] [-d]
//! ```
//!
//! `-k 0` (the default) asks for unbounded analysis; `-r W` switches to
//! write rounds; `-x` picks the explicit engine over the symbolic one;
//! `-d` dumps the witnessed visible states as JSON lines.

use std::error::Error;

use cuba::parse::{default_initial, parse_cpds_file, parse_explicit_state};
use cuba::report::{ReportData, Reporter, WriteReporter};
use cuba::{Analyzer, ExplicitCuba, ExplicitWuba, GeneratorTable, SymbolicCuba};

fn finish<A: Analyzer>(analyzer: &mut A, bound: usize, dump: bool) {
    let verdict = analyzer.run(bound);
    let mut stdout = std::io::stdout();
    let mut reporter = WriteReporter::new(&mut stdout);
    reporter.report_verdict(&ReportData {
        verdict,
        metrics: *analyzer.metrics(),
    });
    if dump {
        reporter.report_visible_states(analyzer.visible_states());
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().default_filter_or("info"), // `RUST_LOG=${LEVEL}` to override
    );

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("USAGE:");
        println!("  cuba -f FILE [-i INITIAL] [-t TARGET] [-k BOUND] [-r C|W] [-x] [-d]");
        return Ok(());
    }
    let file: String = args.value_from_str(["-f", "--input-file"])?;
    let initial: Option<String> = args.opt_value_from_str(["-i", "--initial"])?;
    let target: Option<String> = args.opt_value_from_str(["-t", "--target"])?;
    let bound: usize = args.opt_value_from_str(["-k", "--res-bound"])?.unwrap_or(0);
    let resource: String = args
        .opt_value_from_str(["-r", "--resource"])?
        .unwrap_or_else(|| "C".to_string());
    let explicit = args.contains(["-x", "--explicit"]);
    let dump = args.contains(["-d", "--dump-visible"]);

    let sys = parse_cpds_file(&file)?;
    let initial = match initial {
        Some(s) => parse_explicit_state(&s, &sys)?,
        None => default_initial(&sys),
    };
    let target = target.map(|s| parse_explicit_state(&s, &sys)).transpose()?;
    let generators = GeneratorTable::build(&sys, &initial);

    match resource.as_str() {
        "W" => {
            println!("Write-bounded analysis of {} (bound {}).", file, bound);
            finish(
                &mut ExplicitWuba::new(&sys, initial, generators),
                bound,
                dump,
            );
        }
        _ if explicit => {
            println!("Explicit context-bounded analysis of {} (bound {}).", file, bound);
            finish(
                &mut ExplicitCuba::new(&sys, initial, target, generators),
                bound,
                dump,
            );
        }
        _ => {
            println!("Symbolic context-bounded analysis of {} (bound {}).", file, bound);
            finish(
                &mut SymbolicCuba::new(&sys, initial, target, generators),
                bound,
                dump,
            );
        }
    }
    Ok(())
}
