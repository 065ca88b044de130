use std::time::{Duration, Instant};

use replay_api::error::ClientError;
use replay_api::progress::ProgressReporter;

const EMIT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Messages,
    Bytes,
}

impl Unit {
    fn as_str(self) -> &'static str {
        match self {
            Unit::Messages => "messages",
            Unit::Bytes => "bytes",
        }
    }
}

/// Progress as periodic log lines, at most one per [`EMIT_INTERVAL`].
pub struct LogProgress {
    label: &'static str,
    unit: Unit,
    total: Option<u64>,
    current: u64,
    last_emit: Option<Instant>,
    interval: Duration,
}

impl LogProgress {
    pub fn new(label: &'static str, unit: Unit) -> Self {
        Self {
            label,
            unit,
            total: None,
            current: 0,
            last_emit: None,
            interval: EMIT_INTERVAL,
        }
    }

    fn percent(&self) -> Option<u64> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| self.current.saturating_mul(100) / t)
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    fn emit(&self) {
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => tracing::info!(
                current = self.current,
                total,
                percent,
                unit = self.unit.as_str(),
                "{}",
                self.label
            ),
            _ => tracing::info!(current = self.current, unit = self.unit.as_str(), "{}", self.label),
        }
    }

    fn tick(&mut self) {
        if self.due(Instant::now()) {
            self.emit();
        }
    }
}

impl ProgressReporter for LogProgress {
    fn set_total(&mut self, total: u64) {
        self.total = Some(total);
    }

    fn add(&mut self, delta: u64) {
        self.current = self.current.saturating_add(delta);
        self.tick();
    }

    fn set(&mut self, current: u64) {
        self.current = current;
        self.tick();
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.emit();
        Ok(())
    }
}

/// Reporter for a command run, or `None` when output is quiet.
pub fn reporter(quiet: bool, label: &'static str, unit: Unit) -> Option<Box<dyn ProgressReporter>> {
    if quiet {
        None
    } else {
        Some(Box::new(LogProgress::new(label, unit)))
    }
}
