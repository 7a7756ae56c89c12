//! Classifier-based refinement of the coarse size split.
//!
//! Trains on high-confidence coverage-derived regions, scores every
//! fragment's span, and reassigns fragments whose class probability
//! clears the cutoff; everything else falls back to its size bin.

use super::features::{self, FeatureParams, FeatureRow};
use super::forest::{num_trees_for, BinaryClassifier};
use super::providers::{ConservationSource, SequenceSource};
use super::training::{build_training_regions, TrainingParams, TrainingRegions};
use crate::coverage::CoverageTrack;
use crate::fragments::{split_by_size, BinScheme, Fragment, SizeSplit};
use crate::utils::{Error, GenomicInterval, Result, ScoredInterval};

pub const DEFAULT_CUTOFF: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct RefineParams {
    /// Minimum class probability for reassigning a fragment.
    pub cutoff: f64,
    pub training: TrainingParams,
    pub features: FeatureParams,
}

impl Default for RefineParams {
    fn default() -> RefineParams {
        RefineParams {
            cutoff: DEFAULT_CUTOFF,
            training: TrainingParams::default(),
            features: FeatureParams::default(),
        }
    }
}

/// Refines a coarse size split. On any feature or training failure the
/// error aborts refinement; rerunning the categorization without
/// refinement (coarse split only) is the documented recovery path.
pub fn refine_split<C, S, V>(
    mut split: SizeSplit,
    scheme: &BinScheme,
    tss: &[GenomicInterval],
    sequences: &S,
    conservation: &V,
    params: &RefineParams,
) -> Result<SizeSplit>
where
    C: BinaryClassifier,
    S: SequenceSource,
    V: ConservationSource,
{
    let nf_spans = category_spans(&split, scheme.nucleosome_free_label());
    let mono_spans = category_spans(&split, scheme.mononucleosome_label());

    let nf_track = CoverageTrack::from_spans(nf_spans.iter().map(|(span, _)| span.clone()));
    let mono_track = CoverageTrack::from_spans(mono_spans.iter().map(|(span, _)| span.clone()));
    let regions = build_training_regions(&nf_track, &mono_track, tss, &params.training)?;
    drop(nf_track);
    drop(mono_track);

    let model = train_model::<C, S, V>(
        &regions,
        &nf_spans,
        &mono_spans,
        sequences,
        conservation,
        params,
    )?;
    drop(regions);
    drop(nf_spans);
    drop(mono_spans);

    // score every fragment's own span
    let mut frags: Vec<Fragment> = Vec::new();
    for label in scheme.labels().to_vec() {
        frags.append(&mut split.take_bin(&label));
    }
    let test_rows = test_features(&frags, sequences, conservation, params)?;
    let probs = model.predict(&test_rows);
    if probs.len() != frags.len() {
        return Err(Error::DataConsistency(format!(
            "Classifier returned {} probability rows for {} fragments",
            probs.len(),
            frags.len()
        )));
    }

    let mut free = Vec::new();
    let mut nucleosome = Vec::new();
    let mut unresolved = Vec::new();
    for (frag, p) in frags.into_iter().zip(&probs) {
        if p.nucleosome >= params.cutoff {
            nucleosome.push(frag);
        } else if p.free >= params.cutoff {
            free.push(frag);
        } else {
            unresolved.push(frag);
        }
    }
    log::info!(
        "Refinement: {} nucleosome, {} nucleosome-free, {} unresolved",
        nucleosome.len(),
        free.len(),
        unresolved.len()
    );

    // unresolved fragments fall back to their size bins; reassigned
    // nucleosome fragments are sub-binned across the nucleosomal ranges
    let mut unresolved_split = split_by_size(unresolved, scheme)?;
    let mut nucleosome_split = split_by_size(nucleosome, scheme)?;

    // the nucleosome-free bin is exactly the confident free calls; any
    // other fragment whose size lands there has contradictory evidence
    // and is not kept
    let nf_label = scheme.nucleosome_free_label();
    let contradictory = nucleosome_split.take_bin(nf_label).len()
        + unresolved_split.take_bin(nf_label).len();
    if contradictory > 0 {
        log::warn!(
            "Discarding {} fragments with nucleosome-free sizes but no confident free call",
            contradictory
        );
    }

    let mut refined = SizeSplit::empty(scheme);
    refined.set_bin(nf_label, free);
    for label in scheme.labels().to_vec() {
        if label == nf_label {
            continue;
        }
        let mut from_unresolved = unresolved_split.take_bin(&label);
        let mut from_nucleosome = nucleosome_split.take_bin(&label);
        refined.append_bin(&label, &mut from_unresolved);
        refined.append_bin(&label, &mut from_nucleosome);
    }

    Ok(refined)
}

/// Spans of the unrefined candidate category, paired with the fragment sizes.
fn category_spans(split: &SizeSplit, label: &str) -> Vec<(GenomicInterval, i64)> {
    split
        .bin(label)
        .map(|bin| bin.iter().map(|frag| (frag.span(), frag.size())).collect())
        .unwrap_or_default()
}

fn train_model<C, S, V>(
    regions: &TrainingRegions,
    nf_spans: &[(GenomicInterval, i64)],
    mono_spans: &[(GenomicInterval, i64)],
    sequences: &S,
    conservation: &V,
    params: &RefineParams,
) -> Result<C>
where
    C: BinaryClassifier,
    S: SequenceSource,
    V: ConservationSource,
{
    let free_rows = region_features(&regions.free, nf_spans, sequences, conservation, params)?;
    let nucleosome_rows =
        region_features(&regions.nucleosome, mono_spans, sequences, conservation, params)?;

    let mut labels = vec![false; free_rows.len()];
    labels.extend(std::iter::repeat(true).take(nucleosome_rows.len()));
    let rows: Vec<[f64; 3]> = free_rows
        .iter()
        .chain(&nucleosome_rows)
        .map(|row| row.as_array())
        .collect();

    let num_trees = num_trees_for(rows.len());
    log::debug!(
        "Training on {} free and {} nucleosome regions with {} trees",
        free_rows.len(),
        nucleosome_rows.len(),
        num_trees
    );
    C::train(&rows, &labels, num_trees)
}

fn region_features<S, V>(
    regions: &[ScoredInterval],
    spans: &[(GenomicInterval, i64)],
    sequences: &S,
    conservation: &V,
    params: &RefineParams,
) -> Result<Vec<FeatureRow>>
where
    S: SequenceSource,
    V: ConservationSource,
{
    let intervals: Vec<GenomicInterval> =
        regions.iter().map(|region| region.interval.clone()).collect();
    let frag_lens = features::median_overlap_lengths(&intervals, spans)?;
    let cons = features::conservation_scores(&intervals, conservation, &params.features)?;
    let gc = features::gc_fractions(&intervals, sequences)?;
    features::assemble(intervals.len(), frag_lens, cons, gc)
}

fn test_features<S, V>(
    frags: &[Fragment],
    sequences: &S,
    conservation: &V,
    params: &RefineParams,
) -> Result<Vec<[f64; 3]>>
where
    S: SequenceSource,
    V: ConservationSource,
{
    let intervals: Vec<GenomicInterval> = frags.iter().map(|frag| frag.span()).collect();
    // a fragment's length summary is its own template length
    let frag_lens: Vec<f64> = frags.iter().map(|frag| frag.size() as f64).collect();
    let cons = features::conservation_scores(&intervals, conservation, &params.features)?;
    let gc = features::gc_fractions(&intervals, sequences)?;
    let rows = features::assemble(intervals.len(), frag_lens, cons, gc)?;
    Ok(rows.iter().map(FeatureRow::as_array).collect())
}
