//! Run-length-encoded read-depth tracks built from fragment spans.

use crate::utils::GenomicInterval;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Per-position depth over one contig, stored as maximal runs of equal depth.
/// Positions past the last run have depth zero.
#[derive(Debug, Clone, Default)]
pub struct DepthRuns {
    runs: Vec<(u32, f64)>,
}

impl DepthRuns {
    fn from_events(events: &BTreeMap<u32, i64>) -> DepthRuns {
        let mut runs = Vec::new();
        let mut depth = 0i64;
        let mut prev = 0u32;
        for (&pos, &delta) in events {
            if pos > prev {
                runs.push((pos - prev, depth as f64));
            }
            depth += delta;
            prev = pos;
        }
        DepthRuns { runs }
    }

    /// Total extent of the track (end of the last run).
    pub fn extent(&self) -> u32 {
        self.runs.iter().map(|(len, _)| len).sum()
    }

    pub fn mean_depth(&self) -> f64 {
        let extent = self.extent();
        if extent == 0 {
            return 0.0;
        }
        let total: f64 = self
            .runs
            .iter()
            .map(|&(len, depth)| len as f64 * depth)
            .sum();
        total / extent as f64
    }

    /// Mean depth over [start, end); positions past the track extent count as zero.
    pub fn mean_between(&self, start: u32, end: u32) -> f64 {
        if end <= start {
            return 0.0;
        }
        let mut total = 0.0;
        let mut pos = 0u32;
        for &(len, depth) in &self.runs {
            let run_end = pos + len;
            if run_end > start && pos < end {
                let overlap = run_end.min(end) - pos.max(start);
                total += overlap as f64 * depth;
            }
            pos = run_end;
            if pos >= end {
                break;
            }
        }
        total / (end - start) as f64
    }

    /// Smallest positive depth value `d` such that the cumulative fraction of
    /// positive-depth positions with depth <= `d` is at least `1 - p`.
    /// Returns 0 when the track has no positive-depth positions.
    pub fn quantile_threshold(&self, p: f64) -> f64 {
        let mut by_depth: BTreeMap<u64, u64> = BTreeMap::new();
        for &(len, depth) in &self.runs {
            if depth > 0.0 {
                *by_depth.entry(depth.to_bits()).or_insert(0) += len as u64;
            }
        }
        let total: u64 = by_depth.values().sum();
        if total == 0 {
            return 0.0;
        }

        let mut entries: Vec<(f64, u64)> = by_depth
            .into_iter()
            .map(|(bits, count)| (f64::from_bits(bits), count))
            .collect();
        entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let needed = (1.0 - p) * total as f64;
        let mut cumulative = 0u64;
        for (depth, count) in entries {
            cumulative += count;
            if cumulative as f64 >= needed {
                return depth;
            }
        }
        0.0
    }

    /// Maximal runs of positions with depth strictly above `threshold`.
    pub fn regions_above(&self, threshold: f64) -> Vec<(u32, u32)> {
        let mut regions: Vec<(u32, u32)> = Vec::new();
        let mut pos = 0u32;
        for &(len, depth) in &self.runs {
            let run_end = pos + len;
            if depth > threshold && len > 0 {
                match regions.last_mut() {
                    Some(last) if last.1 == pos => last.1 = run_end,
                    _ => regions.push((pos, run_end)),
                }
            }
            pos = run_end;
        }
        regions
    }

    fn add(&mut self, value: f64) {
        for run in &mut self.runs {
            run.1 += value;
        }
    }
}

/// Read-depth tracks for a set of contigs, built once from fragment spans.
#[derive(Debug, Clone, Default)]
pub struct CoverageTrack {
    tracks: HashMap<Arc<str>, DepthRuns>,
}

impl CoverageTrack {
    pub fn from_spans<I>(spans: I) -> CoverageTrack
    where
        I: IntoIterator<Item = GenomicInterval>,
    {
        let mut events: HashMap<Arc<str>, BTreeMap<u32, i64>> = HashMap::new();
        for span in spans {
            if span.end <= span.start {
                continue;
            }
            let contig_events = events.entry(Arc::clone(&span.contig)).or_default();
            *contig_events.entry(span.start).or_insert(0) += 1;
            *contig_events.entry(span.end).or_insert(0) -= 1;
        }

        let tracks = events
            .into_iter()
            .map(|(contig, contig_events)| (contig, DepthRuns::from_events(&contig_events)))
            .collect();
        CoverageTrack { tracks }
    }

    pub fn contigs(&self) -> impl Iterator<Item = &Arc<str>> {
        self.tracks.keys()
    }

    pub fn get(&self, contig: &str) -> Option<&DepthRuns> {
        self.tracks.get(contig)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drops contigs whose mean depth is zero.
    pub fn drop_zero_depth_contigs(&mut self) {
        self.tracks.retain(|_, runs| runs.mean_depth() > 0.0);
    }

    /// Restricts the track to the named contigs.
    pub fn retain_contigs(&mut self, keep: &[Arc<str>]) {
        self.tracks.retain(|contig, _| keep.contains(contig));
    }

    /// Adds a uniform pseudocount to every covered position.
    pub fn add_pseudocount(&mut self, value: f64) {
        if value == 0.0 {
            return;
        }
        for runs in self.tracks.values_mut() {
            runs.add(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Strand;

    fn span(contig: &str, start: u32, end: u32) -> GenomicInterval {
        GenomicInterval::new(contig, start, end, Strand::Unstranded).unwrap()
    }

    fn single_track(spans: Vec<GenomicInterval>) -> DepthRuns {
        let track = CoverageTrack::from_spans(spans);
        track.get("chr1").unwrap().clone()
    }

    #[test]
    fn depth_runs_from_overlapping_spans() {
        let runs = single_track(vec![span("chr1", 0, 10), span("chr1", 5, 15)]);
        assert_eq!(runs.extent(), 15);
        assert_eq!(runs.mean_between(0, 5), 1.0);
        assert_eq!(runs.mean_between(5, 10), 2.0);
        assert_eq!(runs.mean_between(10, 15), 1.0);
        assert_eq!(runs.mean_between(15, 25), 0.0);
    }

    #[test]
    fn mean_between_spans_run_boundaries() {
        let runs = single_track(vec![span("chr1", 0, 10), span("chr1", 5, 15)]);
        // 5 positions at depth 1, 5 at depth 2
        assert_eq!(runs.mean_between(0, 10), 1.5);
        // half inside the track, half past its extent
        assert_eq!(runs.mean_between(10, 20), 0.5);
    }

    #[test]
    fn quantile_threshold_zero_without_positive_depth() {
        let runs = DepthRuns::default();
        assert_eq!(runs.quantile_threshold(0.1), 0.0);
    }

    #[test]
    fn quantile_threshold_picks_upper_tail() {
        // 90 positions at depth 1, 10 positions at depth 5
        let mut spans = vec![span("chr1", 0, 100)];
        spans.extend(std::iter::repeat_with(|| span("chr1", 90, 100)).take(4));
        let runs = single_track(spans);
        assert_eq!(runs.quantile_threshold(0.1), 1.0);
        // asking for (almost) everything keeps the smallest depth
        assert_eq!(runs.quantile_threshold(1.0), 1.0);
        // a tiny fraction pushes the threshold to the top depth
        assert_eq!(runs.quantile_threshold(0.05), 5.0);
    }

    #[test]
    fn quantile_threshold_monotonic_in_p() {
        let spans = vec![
            span("chr1", 0, 50),
            span("chr1", 20, 80),
            span("chr1", 40, 60),
            span("chr1", 45, 55),
        ];
        let runs = single_track(spans);
        let mut last = f64::INFINITY;
        for p in [0.05, 0.1, 0.25, 0.5, 0.9, 1.0] {
            let threshold = runs.quantile_threshold(p);
            assert!(
                threshold <= last,
                "threshold at p={} was {} > {}",
                p,
                threshold,
                last
            );
            last = threshold;
        }
    }

    #[test]
    fn regions_above_merges_adjacent_runs() {
        let runs = single_track(vec![
            span("chr1", 0, 10),
            span("chr1", 5, 15),
            span("chr1", 10, 20),
            span("chr1", 40, 50),
        ]);
        // depth: [0,5)=1 [5,15)=2 [15,20)=1 [40,50)=1
        assert_eq!(runs.regions_above(1.0), vec![(5, 15)]);
        assert_eq!(runs.regions_above(0.0), vec![(0, 20), (40, 50)]);
    }

    #[test]
    fn pseudocount_and_contig_filters() {
        let mut track = CoverageTrack::from_spans(vec![span("chr1", 0, 10), span("chr2", 0, 0)]);
        track.drop_zero_depth_contigs();
        assert!(track.get("chr2").is_none());

        track.add_pseudocount(0.5);
        assert_eq!(track.get("chr1").unwrap().mean_between(0, 10), 1.5);

        track.retain_contigs(&[]);
        assert!(track.is_empty());
    }
}
