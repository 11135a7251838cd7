//! Progress reporting and cooperative interruption.
//!
//! Matching operations report stage-structured progress through a
//! [`ProgressIndicator`] sink. Every sink method may raise
//! [`Error::Interrupted`], which aborts the whole in-progress operation;
//! interruption is checked at block granularity (every few thousand rows),
//! never mid-row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Rows processed between successive progress/interruption checks.
pub(crate) const PROGRESS_PERIOD: u64 = 4096;

/// Sink for progress and log output of a matching operation.
///
/// Implementations must be callable from worker threads.
pub trait ProgressIndicator: Send + Sync {
    /// Announce the start of a named stage.
    fn start_stage(&self, name: &str) -> Result<()>;

    /// Report fractional completion (0.0 to 1.0) of the current stage.
    fn set_level(&self, fraction: f64) -> Result<()>;

    /// Announce the end of the current stage.
    fn end_stage(&self) -> Result<()>;

    /// Emit a free-form log line.
    fn log_message(&self, text: &str) -> Result<()>;
}

/// Indicator that swallows all output and never interrupts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressIndicator for NullProgress {
    fn start_stage(&self, _name: &str) -> Result<()> {
        Ok(())
    }
    fn set_level(&self, _fraction: f64) -> Result<()> {
        Ok(())
    }
    fn end_stage(&self) -> Result<()> {
        Ok(())
    }
    fn log_message(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Indicator that routes output to the `log` crate.
///
/// Stage starts and log messages go to `info!`; level updates go to
/// `debug!`, throttled to decile steps so bulk scans do not flood the log.
#[derive(Debug, Default)]
pub struct LogProgress {
    state: Mutex<StageState>,
}

#[derive(Debug, Default)]
struct StageState {
    stage: Option<String>,
    last_decile: u8,
}

impl LogProgress {
    /// Create a new log-backed indicator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressIndicator for LogProgress {
    fn start_stage(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.stage = Some(name.to_owned());
        state.last_decile = 0;
        log::info!("{name}...");
        Ok(())
    }

    fn set_level(&self, fraction: f64) -> Result<()> {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0) as u8;
        let mut state = self.state.lock();
        if decile > state.last_decile {
            state.last_decile = decile;
            if let Some(stage) = &state.stage {
                log::debug!("{stage}: {}%", decile * 10);
            }
        }
        Ok(())
    }

    fn end_stage(&self) -> Result<()> {
        self.state.lock().stage = None;
        Ok(())
    }

    fn log_message(&self, text: &str) -> Result<()> {
        log::info!("{text}");
        Ok(())
    }
}

/// Decorator that adds an external abort switch to any indicator.
///
/// Flip the flag returned by [`InterruptibleProgress::trigger`] from any
/// thread and the next progress check point raises
/// [`Error::Interrupted`].
pub struct InterruptibleProgress<P> {
    inner: P,
    interrupted: Arc<AtomicBool>,
}

impl<P: ProgressIndicator> InterruptibleProgress<P> {
    /// Wrap an indicator with a fresh abort flag.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that requests interruption when stored `true`.
    pub fn trigger(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn check(&self) -> Result<()> {
        if self.interrupted.load(Ordering::Relaxed) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

impl<P: ProgressIndicator> ProgressIndicator for InterruptibleProgress<P> {
    fn start_stage(&self, name: &str) -> Result<()> {
        self.check()?;
        self.inner.start_stage(name)
    }
    fn set_level(&self, fraction: f64) -> Result<()> {
        self.check()?;
        self.inner.set_level(fraction)
    }
    fn end_stage(&self) -> Result<()> {
        self.check()?;
        self.inner.end_stage()
    }
    fn log_message(&self, text: &str) -> Result<()> {
        self.check()?;
        self.inner.log_message(text)
    }
}

/// Per-stage helper that rate-limits level updates.
///
/// Calls [`ProgressIndicator::set_level`] once per [`PROGRESS_PERIOD`]
/// rows, which is also where interruption takes effect.
pub struct ProgressTracker<'a> {
    indicator: &'a dyn ProgressIndicator,
    total: u64,
    count: u64,
}

impl<'a> ProgressTracker<'a> {
    /// Start a stage covering `total` items.
    pub fn new(
        indicator: &'a dyn ProgressIndicator,
        total: u64,
        stage: &str,
    ) -> Result<Self> {
        indicator.start_stage(stage)?;
        Ok(Self {
            indicator,
            total,
            count: 0,
        })
    }

    /// Record one processed item.
    #[inline]
    pub fn tick(&mut self) -> Result<()> {
        self.advance(1)
    }

    /// Record `n` processed items.
    pub fn advance(&mut self, n: u64) -> Result<()> {
        let before = self.count;
        self.count += n;
        if self.count / PROGRESS_PERIOD != before / PROGRESS_PERIOD {
            let fraction = if self.total > 0 {
                self.count as f64 / self.total as f64
            } else {
                1.0
            };
            self.indicator.set_level(fraction)?;
        }
        Ok(())
    }

    /// Finish the stage.
    pub fn close(self) -> Result<()> {
        self.indicator.end_stage()
    }
}
