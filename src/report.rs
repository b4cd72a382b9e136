use std::io::Write;

use ahash::AHashSet;
use serde::Serialize;

use crate::analyzer::{Metrics, Verdict};
use crate::config::VisibleState;

/// The data sent when an analysis run completes.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ReportData {
    /// The analysis outcome.
    pub verdict: Verdict,
    /// The exploration counters.
    pub metrics: Metrics,
}

/// A reporter for the outcome of an analysis run.
pub trait Reporter {
    /// Report the verdict and counters at the end of a run.
    fn report_verdict(&mut self, data: &ReportData);

    /// Report the witnessed visible states, indexed by shared state.
    fn report_visible_states(&mut self, visible: &[AHashSet<VisibleState>]);
}

pub struct WriteReporter<'a, W> {
    writer: &'a mut W,
}

impl<'a, W> WriteReporter<'a, W> {
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W> Reporter for WriteReporter<'a, W>
where
    W: Write,
{
    fn report_verdict(&mut self, data: &ReportData) {
        let _ = writeln!(
            self.writer,
            "Done. {}. rounds={}, image calls={}, configs={}, visible states={}",
            data.verdict,
            data.metrics.rounds,
            data.metrics.image_calls,
            data.metrics.unique_configs,
            data.metrics.unique_visible,
        );
    }

    /// Dumps each visible state as one JSON line, ordered for stable
    /// output.
    fn report_visible_states(&mut self, visible: &[AHashSet<VisibleState>]) {
        for set in visible {
            let mut states: Vec<_> = set.iter().collect();
            states.sort();
            for state in states {
                if serde_json::to_writer(&mut *self.writer, state).is_err() {
                    return;
                }
                let _ = writeln!(self.writer);
            }
        }
    }
}
