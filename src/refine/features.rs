//! Per-interval feature extraction: fragment-length summary, conservation
//! summary, and GC fraction, joined row-for-row by interval identity.

use super::providers::{Aggregator, ConservationSource, SequenceSource};
use crate::utils::{math, Error, GenomicInterval, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub frag_len: f64,
    pub conservation: f64,
    pub gc: f64,
}

impl FeatureRow {
    pub fn as_array(&self) -> [f64; 3] {
        [self.frag_len, self.conservation, self.gc]
    }
}

#[derive(Debug, Clone)]
pub struct FeatureParams {
    pub chunk_size: usize,
    pub aggregator: Aggregator,
}

impl Default for FeatureParams {
    fn default() -> FeatureParams {
        FeatureParams {
            chunk_size: DEFAULT_CHUNK_SIZE,
            aggregator: Aggregator::Mean,
        }
    }
}

/// C+G proportion of each interval's reference sequence.
pub fn gc_fractions<S: SequenceSource>(
    intervals: &[GenomicInterval],
    source: &S,
) -> Result<Vec<f64>> {
    let sequences = source.sequences(intervals)?;
    if sequences.len() != intervals.len() {
        return Err(Error::ProviderContract(format!(
            "Sequence lookup returned {} sequences for {} intervals",
            sequences.len(),
            intervals.len()
        )));
    }
    Ok(sequences
        .iter()
        .map(|seq| {
            if seq.is_empty() {
                return 0.0;
            }
            let gc = seq
                .iter()
                .filter(|&&base| matches!(base, b'G' | b'C' | b'g' | b'c'))
                .count();
            gc as f64 / seq.len() as f64
        })
        .collect())
}

/// Per-interval conservation summaries, computed in chunks of
/// `chunk_size` and re-verified against the input coordinates. The
/// conservation backend is known to be inconsistent across versions, so
/// an echo mismatch is fatal. Intervals with no data score 0.
pub fn conservation_scores<C: ConservationSource>(
    intervals: &[GenomicInterval],
    source: &C,
    params: &FeatureParams,
) -> Result<Vec<f64>> {
    let mut scores = Vec::with_capacity(intervals.len());
    for chunk in intervals.chunks(params.chunk_size) {
        let scored = source.scores(chunk, params.aggregator)?;
        if scored.len() != chunk.len() {
            return Err(Error::ProviderContract(format!(
                "Conservation lookup returned {} rows for a chunk of {}",
                scored.len(),
                chunk.len()
            )));
        }
        for (input, (echoed, score)) in chunk.iter().zip(scored) {
            if input.contig != echoed.contig
                || input.start != echoed.start
                || input.end != echoed.end
            {
                return Err(Error::ProviderContract(format!(
                    "Conservation lookup moved interval {} to {}",
                    input, echoed
                )));
            }
            scores.push(score.unwrap_or(0.0));
        }
    }
    Ok(scores)
}

/// Median template length of the fragments whose span overlaps each
/// interval. Spans are `(interval, |tlen|)` pairs from the unrefined
/// candidate category. An interval with no overlapping fragment violates
/// the one-summary-per-interval contract.
pub fn median_overlap_lengths(
    intervals: &[GenomicInterval],
    spans: &[(GenomicInterval, i64)],
) -> Result<Vec<f64>> {
    let mut grouped: HashMap<Arc<str>, Vec<(u32, u32, i64)>> = HashMap::new();
    for (span, size) in spans {
        grouped
            .entry(Arc::clone(&span.contig))
            .or_default()
            .push((span.start, span.end, *size));
    }
    // sorted starts plus a running max of ends bound the backward scan
    let by_contig: HashMap<Arc<str>, (Vec<(u32, u32, i64)>, Vec<u32>)> = grouped
        .into_iter()
        .map(|(contig, mut contig_spans)| {
            contig_spans.sort_by_key(|span| span.0);
            let mut running = 0u32;
            let ends = contig_spans
                .iter()
                .map(|span| {
                    running = running.max(span.1);
                    running
                })
                .collect();
            (contig, (contig_spans, ends))
        })
        .collect();

    let mut medians = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let mut lengths = Vec::new();
        if let Some((contig_spans, ends)) = by_contig.get(&interval.contig) {
            let first_after = contig_spans.partition_point(|span| span.0 < interval.end);
            for j in (0..first_after).rev() {
                if ends[j] <= interval.start {
                    break;
                }
                let (start, end, size) = contig_spans[j];
                if start < interval.end && interval.start < end {
                    lengths.push(size);
                }
            }
        }
        match math::median(&lengths) {
            Some(median) => medians.push(median),
            None => {
                return Err(Error::DataConsistency(format!(
                    "No overlapping fragments for training interval {}; \
                     expected one length summary per interval",
                    interval
                )))
            }
        }
    }
    Ok(medians)
}

/// Column-wise assembly of the feature matrix; the three sources must
/// already be aligned row-for-row by interval.
pub fn assemble(
    num_intervals: usize,
    frag_lens: Vec<f64>,
    conservation: Vec<f64>,
    gc: Vec<f64>,
) -> Result<Vec<FeatureRow>> {
    for (name, column) in [
        ("fragment-length", &frag_lens),
        ("conservation", &conservation),
        ("GC", &gc),
    ] {
        if column.len() != num_intervals {
            return Err(Error::DataConsistency(format!(
                "The {} column has {} rows for {} intervals",
                name,
                column.len(),
                num_intervals
            )));
        }
    }
    Ok(frag_lens
        .into_iter()
        .zip(conservation)
        .zip(gc)
        .map(|((frag_len, conservation), gc)| FeatureRow {
            frag_len,
            conservation,
            gc,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Strand;

    fn iv(contig: &str, start: u32, end: u32) -> GenomicInterval {
        GenomicInterval::new(contig, start, end, Strand::Unstranded).unwrap()
    }

    struct StubSequences(Vec<&'static [u8]>);

    impl SequenceSource for StubSequences {
        fn sequences(&self, _intervals: &[GenomicInterval]) -> Result<Vec<Vec<u8>>> {
            Ok(self.0.iter().map(|seq| seq.to_vec()).collect())
        }
    }

    /// Echoes coordinates faithfully unless `shift` is set; scores every
    /// interval by its start coordinate and records chunk boundaries.
    struct StubConservation {
        shift: bool,
        chunks: std::cell::RefCell<Vec<usize>>,
    }

    impl ConservationSource for StubConservation {
        fn scores(
            &self,
            intervals: &[GenomicInterval],
            _aggregator: Aggregator,
        ) -> Result<Vec<(GenomicInterval, Option<f64>)>> {
            self.chunks.borrow_mut().push(intervals.len());
            Ok(intervals
                .iter()
                .map(|interval| {
                    let mut echoed = interval.clone();
                    if self.shift {
                        echoed.start += 1;
                    }
                    let score = (interval.start > 0).then(|| interval.start as f64);
                    (echoed, score)
                })
                .collect())
        }
    }

    #[test]
    fn gc_fraction_counts_both_cases() {
        let intervals = vec![iv("chr1", 0, 4), iv("chr1", 4, 8)];
        let source = StubSequences(vec![b"ACGT", b"ggcc"]);
        assert_eq!(gc_fractions(&intervals, &source).unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn gc_row_count_mismatch_is_contract_violation() {
        let intervals = vec![iv("chr1", 0, 4), iv("chr1", 4, 8)];
        let source = StubSequences(vec![b"ACGT"]);
        let result = gc_fractions(&intervals, &source);
        assert!(matches!(result, Err(Error::ProviderContract(_))));
    }

    #[test]
    fn conservation_chunks_concatenate_in_input_order() {
        let intervals: Vec<GenomicInterval> =
            (0..10).map(|i| iv("chr1", i * 100, i * 100 + 50)).collect();
        let source = StubConservation {
            shift: false,
            chunks: Default::default(),
        };
        let params = FeatureParams {
            chunk_size: 4,
            ..Default::default()
        };
        let scores = conservation_scores(&intervals, &source, &params).unwrap();
        assert_eq!(*source.chunks.borrow(), vec![4, 4, 2]);
        // interval 0 has no data and coalesces to 0
        let expected: Vec<f64> = (0..10).map(|i| (i * 100) as f64).collect();
        assert_eq!(scores, expected);
    }

    #[test]
    fn conservation_coordinate_mismatch_is_contract_violation() {
        let intervals = vec![iv("chr1", 100, 150)];
        let source = StubConservation {
            shift: true,
            chunks: Default::default(),
        };
        let result = conservation_scores(&intervals, &source, &FeatureParams::default());
        assert!(matches!(result, Err(Error::ProviderContract(_))));
    }

    #[test]
    fn median_overlap_lengths_takes_category_median() {
        let spans = vec![
            (iv("chr1", 0, 200), 200),
            (iv("chr1", 50, 230), 180),
            (iv("chr1", 150, 400), 250),
            (iv("chr2", 0, 100), 100),
        ];
        let intervals = vec![iv("chr1", 40, 60), iv("chr1", 300, 350)];
        let medians = median_overlap_lengths(&intervals, &spans).unwrap();
        assert_eq!(medians, vec![190.0, 250.0]);
    }

    #[test]
    fn interval_without_overlap_is_inconsistent() {
        let spans = vec![(iv("chr1", 0, 100), 100)];
        let intervals = vec![iv("chr1", 500, 600)];
        let result = median_overlap_lengths(&intervals, &spans);
        assert!(matches!(result, Err(Error::DataConsistency(_))));
    }

    #[test]
    fn assemble_rejects_ragged_columns() {
        let result = assemble(2, vec![1.0, 2.0], vec![0.5], vec![0.4, 0.6]);
        assert!(matches!(result, Err(Error::DataConsistency(_))));

        let rows = assemble(1, vec![1.0], vec![0.5], vec![0.4]).unwrap();
        assert_eq!(rows[0].as_array(), [1.0, 0.5, 0.4]);
    }
}
