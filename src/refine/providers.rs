//! Collaborator seams for refinement: genome sequence lookup and per-base
//! conservation scoring.

use crate::utils::{open_genome_reader, open_table_reader, Error, GenomicInterval, Result};
use rust_htslib::faidx;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub trait SequenceSource {
    /// Reference sequences for the given intervals, one per interval, in
    /// input order.
    fn sequences(&self, intervals: &[GenomicInterval]) -> Result<Vec<Vec<u8>>>;
}

/// Summary applied to the per-base conservation scores under an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Mean,
    Min,
    Max,
}

impl FromStr for Aggregator {
    type Err = &'static str;
    fn from_str(aggregator: &str) -> std::result::Result<Self, Self::Err> {
        match aggregator {
            "mean" => Ok(Aggregator::Mean),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            _ => Err("Invalid aggregator"),
        }
    }
}

pub trait ConservationSource {
    /// Per-interval conservation summaries. Implementations must echo the
    /// query coordinates back unchanged and in order; the extractor
    /// verifies the echo against its input. `None` marks an interval with
    /// no conservation data.
    fn scores(
        &self,
        intervals: &[GenomicInterval],
        aggregator: Aggregator,
    ) -> Result<Vec<(GenomicInterval, Option<f64>)>>;
}

pub struct FaidxSequenceSource {
    reader: faidx::Reader,
}

impl FaidxSequenceSource {
    pub fn open(genome_path: &Path) -> Result<FaidxSequenceSource> {
        Ok(FaidxSequenceSource {
            reader: open_genome_reader(genome_path)?,
        })
    }
}

impl SequenceSource for FaidxSequenceSource {
    fn sequences(&self, intervals: &[GenomicInterval]) -> Result<Vec<Vec<u8>>> {
        intervals
            .iter()
            .map(|interval| {
                if interval.width() == 0 {
                    return Ok(Vec::new());
                }
                // faidx takes an inclusive end coordinate
                self.reader
                    .fetch_seq(
                        interval.contig.as_ref(),
                        interval.start as usize,
                        interval.end as usize - 1,
                    )
                    .map(|seq| seq.to_vec())
                    .map_err(|e| Error::Io(format!("{}: {}", interval, e)))
            })
            .collect()
    }
}

/// Conservation scores backed by a bedGraph file (plain or gzipped),
/// held in memory as sorted non-overlapping runs per contig.
pub struct BedGraphConservation {
    runs: HashMap<Arc<str>, Vec<(u32, u32, f64)>>,
}

impl BedGraphConservation {
    pub fn open(path: &Path) -> Result<BedGraphConservation> {
        let reader = open_table_reader(path)?;
        let mut runs: HashMap<Arc<str>, Vec<(u32, u32, f64)>> = HashMap::new();
        let mut contig_cache: HashMap<String, Arc<str>> = HashMap::new();

        for (line_number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                Error::Io(format!(
                    "{}: error reading line {}: {}",
                    path.display(),
                    line_number + 1,
                    e
                ))
            })?;
            if line.is_empty() || line.starts_with('#') || line.starts_with("track") {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                return Err(Error::Io(format!(
                    "{}: expected 4 bedGraph fields at line {}, found {}",
                    path.display(),
                    line_number + 1,
                    fields.len()
                )));
            }
            let parse_err = |what: &str| {
                Error::Io(format!(
                    "{}: invalid {} at line {}",
                    path.display(),
                    what,
                    line_number + 1
                ))
            };
            let start: u32 = fields[1].parse().map_err(|_| parse_err("start"))?;
            let end: u32 = fields[2].parse().map_err(|_| parse_err("end"))?;
            let value: f64 = fields[3].parse().map_err(|_| parse_err("value"))?;

            let contig = contig_cache
                .entry(fields[0].to_string())
                .or_insert_with(|| Arc::from(fields[0]));
            runs.entry(Arc::clone(contig))
                .or_default()
                .push((start, end, value));
        }

        for contig_runs in runs.values_mut() {
            contig_runs.sort_by_key(|run| run.0);
        }
        Ok(BedGraphConservation { runs })
    }

    #[cfg(test)]
    pub fn new_for_test(runs: HashMap<Arc<str>, Vec<(u32, u32, f64)>>) -> BedGraphConservation {
        BedGraphConservation { runs }
    }

    fn summarize(&self, interval: &GenomicInterval, aggregator: Aggregator) -> Option<f64> {
        let contig_runs = self.runs.get(&interval.contig)?;
        let first = contig_runs.partition_point(|run| run.1 <= interval.start);

        let mut weighted_sum = 0.0;
        let mut covered = 0u64;
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for &(start, end, value) in &contig_runs[first..] {
            if start >= interval.end {
                break;
            }
            let overlap = end.min(interval.end) - start.max(interval.start);
            weighted_sum += overlap as f64 * value;
            covered += overlap as u64;
            minimum = minimum.min(value);
            maximum = maximum.max(value);
        }

        if covered == 0 {
            return None;
        }
        Some(match aggregator {
            Aggregator::Mean => weighted_sum / covered as f64,
            Aggregator::Min => minimum,
            Aggregator::Max => maximum,
        })
    }
}

impl ConservationSource for BedGraphConservation {
    fn scores(
        &self,
        intervals: &[GenomicInterval],
        aggregator: Aggregator,
    ) -> Result<Vec<(GenomicInterval, Option<f64>)>> {
        Ok(intervals
            .iter()
            .map(|interval| (interval.clone(), self.summarize(interval, aggregator)))
            .collect())
    }
}
