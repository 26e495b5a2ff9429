use super::chunk::Chunker;
use coarsetime::{Duration as CoarseDuration, Instant as CoarseInstant};
use std::time::Duration;

/// Start a new chunk whenever a fixed interval of wall-clock time has passed.
///
/// The clock is read at the start of every log group so a coarse clock is used.
/// Millisecond accuracy is plenty for intervals of several seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByTime {
    pub interval: CoarseDuration,
    chunk_start: CoarseInstant,
}

impl ByTime {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: CoarseDuration::new(interval.as_secs(), interval.subsec_nanos()),
            chunk_start: CoarseInstant::now(),
        }
    }
}

impl Default for ByTime {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Chunker for ByTime {
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        // Checked before the group so that a burst of logs is not split across two chunks
        self.chunk_start.elapsed() > self.interval
    }

    fn note_flush(&mut self) {
        self.chunk_start = CoarseInstant::now();
    }
}
