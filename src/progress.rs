use std::io::Write;

/// A single "N% complete" line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressReport {
    pub percent: f64,
    pub analysed: u64,
}

/// Throttled progress: reports only when the completed fraction crosses the
/// next benchmark, then moves the benchmark past the current fraction.
#[derive(Clone, Debug)]
pub struct Progress {
    target: u64,
    analysed: u64,
    benchmark: f64,
    increment: f64,
    quiet: bool,
}

impl Progress {
    pub fn new(target: u64, start: f64, increment: f64, quiet: bool) -> Self {
        Self {
            target,
            analysed: 0,
            benchmark: start,
            // a non-positive step would never move past the current fraction
            increment: if increment > 0.0 { increment } else { 0.05 },
            quiet,
        }
    }

    /// Record the new count; returns a report when a benchmark was crossed.
    pub fn advance(&mut self, analysed: u64) -> Option<ProgressReport> {
        self.analysed = analysed;
        if self.target == 0 {
            return None;
        }
        let fraction = analysed as f64 / self.target as f64;
        if fraction < self.benchmark {
            return None;
        }
        while self.benchmark <= fraction {
            self.benchmark += self.increment;
        }
        Some(ProgressReport { percent: fraction * 100.0, analysed })
    }

    /// `advance` plus the carriage-return line on stderr.
    pub fn update(&mut self, analysed: u64) {
        if let Some(r) = self.advance(analysed) {
            if !self.quiet {
                eprint!("{:.0}% complete ({} games)\r", r.percent, r.analysed);
                let _ = std::io::stderr().flush();
            }
        }
    }

    /// Move off the progress line before normal output resumes.
    pub fn finish(&self) {
        if !self.quiet && self.analysed > 0 && self.target > 0 {
            eprintln!();
        }
    }
}
