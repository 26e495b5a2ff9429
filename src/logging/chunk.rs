use super::{Id, LogError, LogValue, StatsLogger};
use crate::utils::stats::OnlineMeanVariance;
use std::collections::{btree_map::Entry, BTreeMap};
use std::time::{Duration, Instant};

/// Decides when the summaries of a [`ChunkLogger`] are written out.
pub trait Chunker {
    /// Called when a log group starts. Returns whether to flush first.
    #[inline]
    fn flush_group_start(&mut self) -> bool {
        false
    }
    /// Called when a log group ends. Returns whether to flush.
    #[inline]
    fn flush_group_end(&mut self) -> bool {
        false
    }
    /// Indicate that the current chunk has been flushed
    fn note_flush(&mut self);
}

/// Write out summaries to a backend.
pub trait SummaryWriter {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>;
}

/// Logs statistics by breaking the stream of values into chunks and summarizing each chunk.
#[derive(Debug, Clone)]
pub struct ChunkLogger<C: Chunker, W: SummaryWriter> {
    chunker: C,
    writer: W,

    // Sorted so that summaries are written in a stable order
    summaries: BTreeMap<Id, Node>,

    // Start time of the current chunk; used by writers to measure rates.
    chunk_start: Instant,
}

impl<C: Chunker, W: SummaryWriter> ChunkLogger<C, W> {
    pub fn new(chunker: C, writer: W) -> Self {
        Self {
            chunker,
            writer,
            summaries: BTreeMap::new(),
            chunk_start: Instant::now(),
        }
    }
}

impl<C: Chunker + Default, W: SummaryWriter + Default> Default for ChunkLogger<C, W> {
    fn default() -> Self {
        Self::new(C::default(), W::default())
    }
}

impl<C: Chunker, W: SummaryWriter> StatsLogger for ChunkLogger<C, W> {
    fn group_start(&mut self) {
        if self.chunker.flush_group_start() {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(id) {
            Entry::Vacant(e) => {
                e.insert(Node::new(value.into()));
            }
            Entry::Occupied(e) => e.into_mut().push(value)?,
        }
        Ok(())
    }

    fn group_end(&mut self) {
        if self.chunker.flush_group_end() {
            self.flush()
        }
    }

    fn flush(&mut self) {
        self.writer.write_summaries(
            self.summaries
                .iter()
                .filter(|(_, node)| node.dirty)
                .map(|(id, node)| (id, &node.summary)),
            self.chunk_start.elapsed(),
        );
        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.chunk_start = Instant::now();
        self.chunker.note_flush();
    }
}

/// Flush when dropped
impl<C: Chunker, W: SummaryWriter> Drop for ChunkLogger<C, W> {
    fn drop(&mut self) {
        if self.summaries.values().any(|node| node.dirty) {
            self.flush();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: ChunkSummary,
    /// Whether the summary has been updated in this chunk
    dirty: bool,
}

impl Node {
    const fn new(summary: ChunkSummary) -> Self {
        Self {
            summary,
            dirty: true,
        }
    }

    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        self.summary.push(value)?;
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.summary.reset()
    }
}

/// Summary of the values logged under one id within a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSummary {
    Nothing,
    Counter {
        increment: u64,
        initial_value: u64,
    },
    Duration {
        stats: OnlineMeanVariance<f64>,
    },
    Scalar {
        stats: OnlineMeanVariance<f64>,
    },
    Index {
        counts: Vec<usize>,
    },
}

impl From<LogValue> for ChunkSummary {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::Nothing => Self::Nothing,
            LogValue::CounterIncrement(increment) => Self::Counter {
                increment,
                initial_value: 0,
            },
            LogValue::Duration(d) => Self::Duration {
                stats: [d.as_secs_f64()].into_iter().collect(),
            },
            LogValue::Scalar(v) => Self::Scalar {
                stats: [v].into_iter().collect(),
            },
            LogValue::Index { value, size } => {
                let mut counts = vec![0; size];
                if let Some(c) = counts.get_mut(value) {
                    *c += 1;
                }
                Self::Index { counts }
            }
        }
    }
}

impl ChunkSummary {
    /// Add a value to the summary.
    ///
    /// The value is rejected if it was created from a different [`LogValue`] variant or has a
    /// different structure from the values already in the summary.
    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Nothing, LogValue::Nothing) => {}
            (Self::Counter { increment, .. }, LogValue::CounterIncrement(i)) => *increment += i,
            (Self::Duration { stats }, LogValue::Duration(d)) => stats.push(d.as_secs_f64()),
            (Self::Scalar { stats }, LogValue::Scalar(v)) => stats.push(v),
            (Self::Index { counts }, LogValue::Index { value, size }) => {
                if counts.len() != size {
                    return Err(LogError::IncompatibleIndexSize {
                        prev: counts.len(),
                        now: size,
                    });
                }
                if let Some(c) = counts.get_mut(value) {
                    *c += 1;
                }
            }
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.variant_name(),
                    now: value.variant_name(),
                })
            }
        };
        Ok(())
    }

    /// Reset for the start of the next chunk.
    fn reset(&mut self) {
        match self {
            Self::Nothing => {}
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0
            }
            Self::Duration { stats } | Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
            Self::Index { counts } => counts.iter_mut().for_each(|c| *c = 0),
        }
    }

    /// Name of the [`LogValue`] variant that this summarizes.
    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Counter { .. } => "CounterIncrement",
            Self::Duration { .. } => "Duration",
            Self::Scalar { .. } => "Scalar",
            Self::Index { .. } => "Index",
        }
    }
}
