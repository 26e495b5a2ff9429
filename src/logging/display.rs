//! Logger printing periodic summaries to the terminal.
use super::chunk::{ChunkLogger, ChunkSummary, Chunker, SummaryWriter};
use super::{ByTime, Id, LogError, LogValue, StatsLogger};
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays chunk summaries on standard output.
#[derive(Debug, Default, Clone)]
pub struct DisplayLogger<C: Chunker = ByTime>(ChunkLogger<C, DisplayBackend>);

impl<C: Chunker> DisplayLogger<C> {
    #[inline]
    pub fn new(chunker: C) -> Self {
        Self(ChunkLogger::new(chunker, DisplayBackend))
    }
}

impl<C: Chunker> StatsLogger for DisplayLogger<C> {
    #[inline]
    fn group_start(&mut self) {
        self.0.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.0.group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.0.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.0.flush()
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayBackend;

impl SummaryWriter for DisplayBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'a Id, &'a ChunkSummary)>,
    {
        println!();
        for (id, summary) in summaries {
            println!(
                "{:<24} {}",
                Paint::fixed(35, id),
                SummaryLine {
                    summary,
                    elapsed: &elapsed
                }
            );
        }
    }
}

struct SummaryLine<'a> {
    summary: &'a ChunkSummary,
    elapsed: &'a Duration,
}

impl fmt::Display for SummaryLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary {
            ChunkSummary::Nothing => Ok(()),
            ChunkSummary::Counter {
                increment,
                initial_value,
            } => {
                write!(
                    f,
                    "{}  (+{})",
                    initial_value + increment,
                    Paint::fixed(253, increment)
                )?;
                let secs = self.elapsed.as_secs_f64();
                if *increment > 5 && secs > 0.0 {
                    let rate = *increment as f64 / secs;
                    write!(f, "  {}", Paint::fixed(111, format!("{:.1}/s", Compact(rate))))?;
                }
                Ok(())
            }
            ChunkSummary::Duration { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.4?}", Duration::from_secs_f64(mean))?;
                    if let (true, Some(sd)) = (stats.count() > 1, stats.stddev()) {
                        let sd = Duration::from_secs_f64(sd);
                        write!(f, " {}", Paint::fixed(8, format!("(σ {:.4?})", sd)))?;
                    }
                    let share = mean / self.elapsed.as_secs_f64() * 100.0;
                    if share.is_finite() {
                        write!(f, " {}", Paint::fixed(221, format!("{:.2}%", share)))?;
                    }
                }
                Ok(())
            }
            ChunkSummary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.3}", Compact(mean))?;
                    if let (true, Some(sd)) = (stats.count() > 1, stats.stddev()) {
                        write!(f, " {}", Paint::fixed(8, format!("(σ {:.3})", Compact(sd))))?;
                    }
                }
                Ok(())
            }
            ChunkSummary::Index { counts } => {
                let n: usize = counts.iter().sum();
                write!(f, "(n {})  [", n)?;
                for (i, c) in counts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", c * 100 / n.max(1))?;
                }
                f.write_str("]%")
            }
        }
    }
}

/// Float formatting that switches to scientific notation for very large or small magnitudes.
struct Compact(f64);

impl fmt::Display for Compact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let magnitude = self.0.abs();
        if self.0 != 0.0 && !(1e-4..1e6).contains(&magnitude) {
            fmt::LowerExp::fmt(&self.0, f)
        } else {
            fmt::Display::fmt(&self.0, f)
        }
    }
}
