//! Logging statistics from simulation and estimation runs.
//!
//! Values are logged under hierarchical [`Id`]s to a [`StatsLogger`].
//! Loggers such as [`DisplayLogger`] summarize the logged values over chunks of time and
//! periodically write the summaries out.
//! The unit type `()` is a logger that discards everything.
mod by_time;
mod chunk;
mod display;

pub use by_time::ByTime;
pub use chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
pub use display::DisplayLogger;

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Hierarchical identifier of a logged value.
///
/// Displayed as the path components separated by `/`.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    path: Vec<Cow<'static, str>>,
}

impl Id {
    /// Prepend a scope to the path.
    #[must_use]
    pub fn with_prefix(mut self, scope: &'static str) -> Self {
        self.path.insert(0, scope.into());
        self
    }
}

impl From<&'static str> for Id {
    fn from(name: &'static str) -> Self {
        Self {
            path: vec![name.into()],
        }
    }
}

impl FromIterator<&'static str> for Id {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        Self {
            path: iter.into_iter().map(Cow::Borrowed).collect(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for part in &self.path {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// A value that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    /// Nothing. No data to log.
    Nothing,
    /// Increment a counter.
    CounterIncrement(u64),
    /// A duration. Aggregated by taking means.
    Duration(Duration),
    /// A scalar value. Aggregated by taking means.
    Scalar(f64),
    /// A sample from a distribution over `0 .. size`.
    Index { value: usize, size: usize },
}

impl LogValue {
    /// Name of the enum variant
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Duration(_) => "Duration",
            Self::Scalar(_) => "Scalar",
            Self::Index { .. } => "Index",
        }
    }
}

impl From<f64> for LogValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Duration> for LogValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// Error logging a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("incompatible value type; previously {prev} now {now}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
    #[error("incompatible index size; previously {prev} now {now}")]
    IncompatibleIndexSize { prev: usize, now: usize },
}

/// Log statistics.
///
/// Values logged within the same group are treated as having happened at the same time.
pub trait StatsLogger {
    /// Start a new group of logs.
    fn group_start(&mut self);

    /// Log a value within the current group.
    ///
    /// # Errors
    /// If the value is structurally incompatible with previous values logged under the same id.
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError>;

    /// End the current group of logs.
    fn group_end(&mut self);

    /// Write out any pending summaries.
    fn flush(&mut self);

    /// Log a single value in its own group.
    ///
    /// # Errors
    /// If the value is structurally incompatible with previous values logged under the same id.
    fn log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(id, value);
        self.group_end();
        result
    }

    /// Log a scalar value.
    ///
    /// # Errors
    /// If a non-scalar was previously logged with the same name.
    fn log_scalar(&mut self, name: &'static str, value: f64) -> Result<(), LogError> {
        self.log(name.into(), LogValue::Scalar(value))
    }

    /// Log a counter increment.
    ///
    /// # Errors
    /// If a non-counter was previously logged with the same name.
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) -> Result<(), LogError> {
        self.log(name.into(), LogValue::CounterIncrement(increment))
    }

    /// Log a sample from a categorical distribution.
    ///
    /// # Errors
    /// If a non-index or an index with a different size was previously logged with the same name.
    fn log_index(&mut self, name: &'static str, value: usize, size: usize) -> Result<(), LogError> {
        self.log(name.into(), LogValue::Index { value, size })
    }

    /// Wrap this logger such that all logged ids are prefixed by `scope`.
    fn with_scope(self, scope: &'static str) -> ScopedLogger<Self>
    where
        Self: Sized,
    {
        ScopedLogger::new(scope, self)
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    fn group_start(&mut self) {}
    fn group_log(&mut self, _: Id, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }
    fn group_end(&mut self) {}
    fn flush(&mut self) {}
}

impl<L: StatsLogger + ?Sized> StatsLogger for &mut L {
    fn group_start(&mut self) {
        L::group_start(self)
    }
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        L::group_log(self, id, value)
    }
    fn group_end(&mut self) {
        L::group_end(self)
    }
    fn flush(&mut self) {
        L::flush(self)
    }
}

/// Log to two loggers at once.
impl<A: StatsLogger, B: StatsLogger> StatsLogger for (A, B) {
    fn group_start(&mut self) {
        self.0.group_start();
        self.1.group_start();
    }
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        let r0 = self.0.group_log(id.clone(), value.clone());
        let r1 = self.1.group_log(id, value);
        r0.and(r1)
    }
    fn group_end(&mut self) {
        self.0.group_end();
        self.1.group_end();
    }
    fn flush(&mut self) {
        self.0.flush();
        self.1.flush();
    }
}

/// Logger that prefixes all ids with a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedLogger<L> {
    scope: &'static str,
    logger: L,
}

impl<L> ScopedLogger<L> {
    pub const fn new(scope: &'static str, logger: L) -> Self {
        Self { scope, logger }
    }
}

impl<L: StatsLogger> StatsLogger for ScopedLogger<L> {
    fn group_start(&mut self) {
        self.logger.group_start()
    }
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.logger.group_log(id.with_prefix(self.scope), value)
    }
    fn group_end(&mut self) {
        self.logger.group_end()
    }
    fn flush(&mut self) {
        self.logger.flush()
    }
}
