//! Builds the classifier training regions from the nucleosome-free and
//! mononucleosome candidate coverage tracks.

use crate::coverage::CoverageTrack;
use crate::utils::{Error, GenomicInterval, Result, ScoredInterval, Strand};
use itertools::Itertools;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TrainingParams {
    /// Target fraction of positive-depth positions kept above the
    /// quantile threshold.
    pub fraction: f64,
    /// Width every surviving region is re-centered to.
    pub region_width: u32,
    /// Minimum width of a disjoint atom to stay a candidate.
    pub min_atom_width: u32,
    /// At most this many highest-coverage regions per side.
    pub max_regions: usize,
}

impl Default for TrainingParams {
    fn default() -> TrainingParams {
        TrainingParams {
            fraction: 0.1,
            region_width: 80,
            min_atom_width: 40,
            max_regions: 100_000,
        }
    }
}

#[derive(Debug)]
pub struct TrainingRegions {
    pub free: Vec<ScoredInterval>,
    pub nucleosome: Vec<ScoredInterval>,
}

/// Candidate region with its nearest-TSS strand, before atomization.
type StrandedRegion = (u32, u32, Strand);

pub fn build_training_regions(
    nf_track: &CoverageTrack,
    mono_track: &CoverageTrack,
    tss: &[GenomicInterval],
    params: &TrainingParams,
) -> Result<TrainingRegions> {
    if params.fraction <= 0.0 || params.fraction > 1.0 {
        return Err(Error::Config(format!(
            "Training fraction must be in (0, 1], got {}",
            params.fraction
        )));
    }

    // working set: contigs covered by both candidate tracks
    let contigs: Vec<Arc<str>> = nf_track
        .contigs()
        .filter(|contig| mono_track.get(contig).is_some())
        .cloned()
        .sorted()
        .collect();

    let mut nf_regions: Vec<(Arc<str>, Vec<StrandedRegion>)> = Vec::new();
    let mut mono_regions: Vec<(Arc<str>, Vec<StrandedRegion>)> = Vec::new();
    for contig in &contigs {
        let nf_runs = nf_track.get(contig).unwrap();
        let mono_runs = mono_track.get(contig).unwrap();

        // the shared threshold favors sensitivity of the weaker track
        let threshold = nf_runs
            .quantile_threshold(params.fraction)
            .min(mono_runs.quantile_threshold(params.fraction));

        let tss_sites = tss_sites_on(tss, contig);
        let strand_regions = |regions: Vec<(u32, u32)>| -> Vec<StrandedRegion> {
            regions
                .into_iter()
                .map(|(start, end)| (start, end, nearest_tss_strand(&tss_sites, start, end)))
                .collect()
        };

        nf_regions.push((
            Arc::clone(contig),
            strand_regions(nf_runs.regions_above(threshold)),
        ));
        mono_regions.push((
            Arc::clone(contig),
            strand_regions(mono_runs.regions_above(threshold)),
        ));
    }

    check_nonempty(&nf_regions, &mono_regions)?;

    // disjoint atoms of the union, netted so that atoms covered by only
    // one side keep that side's identity
    let mut free_candidates: Vec<GenomicInterval> = Vec::new();
    let mut nucleosome_candidates: Vec<GenomicInterval> = Vec::new();
    for ((contig, nf), (_, mono)) in nf_regions.iter().zip(&mono_regions) {
        for (start, end, strand, net) in atomize(nf, mono) {
            if end - start < params.min_atom_width {
                continue;
            }
            let interval = GenomicInterval {
                contig: Arc::clone(contig),
                start,
                end,
                strand,
            };
            if net < 0 {
                free_candidates.push(interval);
            } else if net > 0 {
                nucleosome_candidates.push(interval);
            }
        }
    }

    if free_candidates.is_empty() || nucleosome_candidates.is_empty() {
        let side = if free_candidates.is_empty() {
            "nucleosome-free"
        } else {
            "mononucleosome"
        };
        return Err(Error::InsufficientData(format!(
            "The {} candidate set is empty after atom filtering",
            side
        )));
    }

    Ok(TrainingRegions {
        free: score_and_rank(free_candidates, nf_track, params),
        nucleosome: score_and_rank(nucleosome_candidates, mono_track, params),
    })
}

fn check_nonempty(
    nf_regions: &[(Arc<str>, Vec<StrandedRegion>)],
    mono_regions: &[(Arc<str>, Vec<StrandedRegion>)],
) -> Result<()> {
    for (side, regions) in [
        ("nucleosome-free", nf_regions),
        ("mononucleosome", mono_regions),
    ] {
        if regions.iter().all(|(_, r)| r.is_empty()) {
            return Err(Error::InsufficientData(format!(
                "The {} candidate set is empty: no positions exceed the shared coverage threshold",
                side
            )));
        }
    }
    Ok(())
}

/// TSS positions on one contig: the 5' end of each transcript interval.
fn tss_sites_on(tss: &[GenomicInterval], contig: &Arc<str>) -> Vec<(u32, Strand)> {
    let mut sites: Vec<(u32, Strand)> = tss
        .iter()
        .filter(|t| t.contig == *contig)
        .map(|t| match t.strand {
            Strand::Reverse => (t.end, Strand::Reverse),
            _ => (t.start, t.strand),
        })
        .collect();
    sites.sort_by_key(|site| site.0);
    sites
}

fn nearest_tss_strand(sites: &[(u32, Strand)], start: u32, end: u32) -> Strand {
    if sites.is_empty() {
        return Strand::Unstranded;
    }
    let mid = start + (end - start) / 2;
    let idx = sites.partition_point(|site| site.0 < mid);
    let after = sites.get(idx);
    let before = idx.checked_sub(1).and_then(|i| sites.get(i));
    match (before, after) {
        (Some(&(pos_b, strand_b)), Some(&(pos_a, strand_a))) => {
            if mid - pos_b <= pos_a - mid {
                strand_b
            } else {
                strand_a
            }
        }
        (Some(&(_, strand)), None) | (None, Some(&(_, strand))) => strand,
        (None, None) => Strand::Unstranded,
    }
}

/// Partitions the union of both region sets into disjoint atoms and nets
/// the unary weights: +1 where a mononucleosome region covers, -1 where a
/// nucleosome-free region covers.
fn atomize(
    nf: &[StrandedRegion],
    mono: &[StrandedRegion],
) -> Vec<(u32, u32, Strand, i32)> {
    let mut bounds: Vec<u32> = nf
        .iter()
        .chain(mono)
        .flat_map(|&(start, end, _)| [start, end])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();

    let covering = |regions: &[StrandedRegion], start: u32| -> Option<Strand> {
        let idx = regions.partition_point(|&(s, _, _)| s <= start);
        idx.checked_sub(1).and_then(|i| {
            let (s, e, strand) = regions[i];
            (s <= start && start < e).then_some(strand)
        })
    };

    bounds
        .windows(2)
        .filter_map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let nf_strand = covering(nf, start);
            let mono_strand = covering(mono, start);
            let net = mono_strand.is_some() as i32 - nf_strand.is_some() as i32;
            if net == 0 {
                return None;
            }
            let strand = mono_strand.or(nf_strand).unwrap_or(Strand::Unstranded);
            Some((start, end, strand, net))
        })
        .collect()
}

/// Re-centers candidates to the fixed width, scores them by mean coverage
/// in their own track, and keeps the highest-confidence ones.
fn score_and_rank(
    candidates: Vec<GenomicInterval>,
    track: &CoverageTrack,
    params: &TrainingParams,
) -> Vec<ScoredInterval> {
    let mut scored: Vec<ScoredInterval> = candidates
        .into_iter()
        .map(|candidate| {
            let interval = candidate.recenter(params.region_width);
            let score = track
                .get(&interval.contig)
                .map_or(0.0, |runs| runs.mean_between(interval.start, interval.end));
            ScoredInterval { interval, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    scored.truncate(params.max_regions);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(contig: &str, start: u32, end: u32) -> GenomicInterval {
        GenomicInterval::new(contig, start, end, Strand::Unstranded).unwrap()
    }

    /// Depth-1 baseline over `base` with extra stacked spans on top; the
    /// baseline keeps the quantile threshold at 1 so the spikes become
    /// the above-threshold candidate regions.
    fn track(base: (u32, u32), spikes: &[((u32, u32), usize)]) -> CoverageTrack {
        let mut spans = vec![span("chr1", base.0, base.1)];
        for &((start, end), depth) in spikes {
            for _ in 0..depth {
                spans.push(span("chr1", start, end));
            }
        }
        CoverageTrack::from_spans(spans)
    }

    #[test]
    fn disjoint_candidate_tracks_yield_both_sides() {
        let nf = track((0, 4000), &[((0, 200), 5)]);
        let mono = track((0, 4000), &[((1000, 1200), 5)]);
        let tss =
            vec![GenomicInterval::new("chr1", 100, 600, Strand::Forward).unwrap()];
        let params = TrainingParams {
            max_regions: 10,
            ..Default::default()
        };

        let regions = build_training_regions(&nf, &mono, &tss, &params).unwrap();
        // each side's exclusive atom keeps that side's identity
        assert_eq!(regions.free.len(), 1);
        assert_eq!(regions.nucleosome.len(), 1);
        for region in regions.free.iter().chain(&regions.nucleosome) {
            assert_eq!(region.interval.width(), params.region_width);
            assert_eq!(region.interval.strand, Strand::Forward);
        }
        let free_mid = regions.free[0].interval.midpoint();
        assert!(free_mid < 200, "midpoint {}", free_mid);
        let nuc_mid = regions.nucleosome[0].interval.midpoint();
        assert!((1000..1200).contains(&nuc_mid), "midpoint {}", nuc_mid);
        // free regions are scored in the nf track, which is at depth 6 there
        assert_eq!(regions.free[0].score, 6.0);
        assert_eq!(regions.nucleosome[0].score, 6.0);
    }

    #[test]
    fn empty_mono_candidates_name_the_empty_side() {
        // nf has a clear spike; mono is flat and yields nothing above threshold
        let nf = track((0, 4000), &[((0, 200), 5)]);
        let mono = track((0, 4000), &[]);
        let err = build_training_regions(&nf, &mono, &[], &TrainingParams::default())
            .unwrap_err();
        match err {
            Error::InsufficientData(msg) => assert!(msg.contains("mononucleosome"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn coinciding_candidates_cancel_in_atoms() {
        // both tracks flag the same region; every atom nets to zero
        let nf = track((0, 4000), &[((0, 200), 5)]);
        let mono = track((0, 4000), &[((0, 200), 3)]);
        let err = build_training_regions(&nf, &mono, &[], &TrainingParams::default())
            .unwrap_err();
        match err {
            Error::InsufficientData(msg) => {
                assert!(msg.contains("nucleosome-free"), "{}", msg)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn narrow_atoms_are_filtered() {
        // the nf-only atom [0, 30) is narrower than min_atom_width
        let nf = track((0, 4000), &[((0, 30), 5)]);
        let mono = track((0, 4000), &[((1000, 1200), 5)]);
        let err = build_training_regions(&nf, &mono, &[], &TrainingParams::default())
            .unwrap_err();
        match err {
            Error::InsufficientData(msg) => {
                assert!(msg.contains("nucleosome-free"), "{}", msg)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn regions_are_ranked_by_own_track_coverage_and_capped() {
        // two mono-only atoms with different mono depths; the cap keeps
        // the deeper one
        let nf = track((0, 4200), &[((0, 150), 8)]);
        let mono = track((0, 4200), &[((2000, 2100), 5), ((4000, 4100), 2)]);
        let params = TrainingParams {
            max_regions: 1,
            ..Default::default()
        };
        let regions = build_training_regions(&nf, &mono, &[], &params).unwrap();
        assert_eq!(regions.nucleosome.len(), 1);
        let top = &regions.nucleosome[0];
        assert!(
            (2000..2100).contains(&top.interval.midpoint()),
            "midpoint {}",
            top.interval.midpoint()
        );
        assert_eq!(top.score, 6.0);
        assert_eq!(top.interval.strand, Strand::Unstranded);
    }

    #[test]
    fn unstranded_without_tss_forward_with_nearest() {
        let sites = vec![(100, Strand::Forward), (1000, Strand::Reverse)];
        assert_eq!(nearest_tss_strand(&sites, 80, 120), Strand::Forward);
        assert_eq!(nearest_tss_strand(&sites, 900, 960), Strand::Reverse);
        assert_eq!(nearest_tss_strand(&[], 80, 120), Strand::Unstranded);
    }
}
