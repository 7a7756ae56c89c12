//! TSS enrichment scoring: normalized promoter-window coverage profiles
//! aggregated across transcripts.

use super::smooth::loess_smooth;
use crate::coverage::{CoverageTrack, DepthRuns};
use crate::fragments::Fragment;
use crate::utils::{Error, GenomicInterval, Result, Strand};
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TssParams {
    /// Bases upstream of the TSS covered by the promoter window.
    pub upstream: u32,
    /// Bases downstream of the TSS covered by the promoter window.
    pub downstream: u32,
    /// Size of the flank regions at the window extremes used as the
    /// reference noise level.
    pub end_size: u32,
    pub window_width: u32,
    pub window_step: u32,
    pub pseudocount: f64,
    /// Span fraction of the local-regression smoother.
    pub smooth_span: f64,
}

impl Default for TssParams {
    fn default() -> TssParams {
        TssParams {
            upstream: 1000,
            downstream: 1000,
            end_size: 100,
            window_width: 100,
            window_step: 100,
            pseudocount: 0.0,
            smooth_span: 0.3,
        }
    }
}

impl TssParams {
    fn validate(&self) -> Result<usize> {
        if self.window_width == 0 || self.window_step == 0 {
            return Err(Error::Config(
                "Window width and step must be positive".to_string(),
            ));
        }
        let span = self.upstream + self.downstream;
        if span < self.window_width {
            return Err(Error::Config(format!(
                "Promoter window of {} is narrower than one sliding window of {}",
                span, self.window_width
            )));
        }
        if self.end_size == 0 || self.end_size > span {
            return Err(Error::Config(format!(
                "End-flank size {} does not fit the promoter window of {}",
                self.end_size, span
            )));
        }
        Ok(((span - self.window_width) / self.window_step) as usize + 1)
    }
}

/// The aggregate profile over the promoter window plus its peak score.
#[derive(Debug, Clone)]
pub struct TssEnrichment {
    /// Raw per-bin aggregate, index 0 at the upstream edge. Bins with no
    /// usable value on any transcript are NaN.
    pub profile: Vec<f64>,
    /// The profile after local-regression smoothing.
    pub smoothed: Vec<f64>,
    /// Maximum finite smoothed value.
    pub score: f64,
}

pub fn score_tss_enrichment(
    frags: &[Fragment],
    transcripts: &[GenomicInterval],
    params: &TssParams,
) -> Result<TssEnrichment> {
    let num_bins = params.validate()?;

    let mut track = CoverageTrack::from_spans(frags.iter().map(Fragment::span));
    track.drop_zero_depth_contigs();
    let shared: Vec<Arc<str>> = transcripts
        .iter()
        .map(|t| &t.contig)
        .filter(|contig| track.get(contig).is_some())
        .unique()
        .cloned()
        .collect();
    track.retain_contigs(&shared);
    track.add_pseudocount(params.pseudocount);

    let mut sums = vec![0.0; num_bins];
    let mut counts = vec![0u64; num_bins];
    let mut seen: HashSet<(Arc<str>, u32, Strand)> = HashSet::new();
    for transcript in transcripts {
        let runs = match track.get(&transcript.contig) {
            Some(runs) => runs,
            None => continue,
        };
        let tss = match transcript.strand {
            Strand::Reverse => transcript.end,
            _ => transcript.start,
        };
        if !seen.insert((Arc::clone(&transcript.contig), tss, transcript.strand)) {
            continue;
        }

        let values = transcript_profile(runs, tss, transcript.strand, params, num_bins);
        for (bin, value) in values.into_iter().enumerate() {
            if let Some(value) = value {
                sums[bin] += value;
                counts[bin] += 1;
            }
        }
    }
    drop(track);

    if counts.iter().all(|&count| count == 0) {
        return Err(Error::InsufficientSignal(
            "No transcript yielded a usable promoter-window value".to_string(),
        ));
    }

    let profile: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { f64::NAN })
        .collect();
    let smoothed = loess_smooth(&profile, params.smooth_span);
    let score = smoothed
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !score.is_finite() {
        return Err(Error::InsufficientSignal(
            "Smoothing left no finite profile value".to_string(),
        ));
    }

    Ok(TssEnrichment {
        profile,
        smoothed,
        score,
    })
}

/// Normalized sliding-window values over one promoter window, oriented so
/// that index 0 is the most upstream bin.
fn transcript_profile(
    runs: &DepthRuns,
    tss: u32,
    strand: Strand,
    params: &TssParams,
    num_bins: usize,
) -> Vec<Option<f64>> {
    // in genomic coordinates, upstream is to the left on the forward
    // strand and to the right on the reverse strand
    let (left_extent, right_extent) = match strand {
        Strand::Reverse => (params.downstream, params.upstream),
        _ => (params.upstream, params.downstream),
    };
    let window_start = tss as i64 - left_extent as i64;
    let window_end = tss as i64 + right_extent as i64;

    let flank_mean = |start: i64| -> Option<f64> {
        if start < 0 {
            return None;
        }
        Some(runs.mean_between(start as u32, start as u32 + params.end_size))
    };
    let left_flank = flank_mean(window_start);
    let right_flank = flank_mean(window_end - params.end_size as i64);

    // one missing flank borrows the other; with both missing only the
    // pseudocount is left as the noise estimate
    let (left, right) = match (left_flank, right_flank) {
        (Some(left), Some(right)) => (left, right),
        (Some(left), None) => (left, left),
        (None, Some(right)) => (right, right),
        (None, None) => (params.pseudocount, params.pseudocount),
    };
    let flank_sum = left + right;

    let mut values = Vec::with_capacity(num_bins);
    for bin in 0..num_bins {
        let bin_start = window_start + (bin as u32 * params.window_step) as i64;
        if bin_start < 0 || flank_sum <= 0.0 {
            values.push(None);
            continue;
        }
        let mean =
            runs.mean_between(bin_start as u32, bin_start as u32 + params.window_width);
        let normalized =
            mean * params.end_size as f64 / (flank_sum / 2.0) / params.window_width as f64;
        values.push(Some(normalized));
    }

    if strand == Strand::Reverse {
        values.reverse();
    }
    values
}
