use std::io::{self, Write};
use std::time::Instant;

use crate::table::Row;

/// Batch lifecycle events. The sink is the only required observability
/// channel; the driver itself never writes to stdout/stderr.
#[derive(Debug)]
pub enum GenerateEvent<'a> {
    Start { total_rows: usize },
    RowStart { index: usize, row: &'a Row },
    RowDone { index: usize, filename: &'a str },
    RowError { index: usize, error: &'a str },
    Complete { generated: usize, total_rows: usize },
}

/// Sinks must be `Sync`: with `--jobs` above one, row events arrive from
/// worker threads.
pub trait ProgressSink: Sync {
    fn event(&self, event: GenerateEvent<'_>);
}

/// Sink that swallows everything, for callers that do not need reporting.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn event(&self, _event: GenerateEvent<'_>) {}
}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }
}

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: GenerateEvent<'_>) {
        match event {
            GenerateEvent::Start { total_rows } => {
                self.info(format!("processing {total_rows} row(s)"));
            }
            GenerateEvent::RowStart { index, row } => {
                let learner = row.field("Learner Name").trim();
                let learner = if learner.is_empty() {
                    "(no name)"
                } else {
                    learner
                };
                self.info(format!("row {}: generating for {learner}", index + 1));
            }
            GenerateEvent::RowDone { index, filename } => {
                self.info(format!("row {}: wrote {filename}", index + 1));
            }
            GenerateEvent::RowError { index, error } => {
                self.info(format!("row {}: ERROR {error}", index + 1));
            }
            GenerateEvent::Complete {
                generated,
                total_rows,
            } => {
                self.info(format!("generated {generated}/{total_rows} document(s)"));
            }
        }
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::fmt_elapsed;

    #[test]
    fn elapsed_formatting() {
        assert_eq!(fmt_elapsed(0.0), "00:00");
        assert_eq!(fmt_elapsed(75.2), "01:15");
        assert_eq!(fmt_elapsed(3700.0), "01:01:40");
    }
}
