//! Size-based fragment categorization: named length bins over a
//! caller-supplied breakpoint scheme.

use super::Fragment;
use crate::utils::{Error, Result};
use std::collections::HashSet;

pub const DEFAULT_LABELS: [&str; 8] = [
    "NucleosomeFree",
    "inter1",
    "mononucleosome",
    "inter2",
    "dinucleosome",
    "inter3",
    "trinucleosome",
    "others",
];

pub const DEFAULT_BREAKS: [f64; 9] = [
    0.0,
    100.0,
    180.0,
    247.0,
    315.0,
    560.0,
    615.0,
    700.0,
    f64::INFINITY,
];

/// An ordered set of category labels bound to half-open template-length
/// bins. Bin `i` covers `[breaks[i], breaks[i+1])`, so a length exactly
/// equal to a breakpoint falls into the higher bin.
#[derive(Debug, Clone)]
pub struct BinScheme {
    labels: Vec<String>,
    breaks: Vec<f64>,
    nucleosome_free: String,
    mononucleosome: String,
}

impl BinScheme {
    pub fn new(
        labels: Vec<String>,
        breaks: Vec<f64>,
        nucleosome_free: &str,
        mononucleosome: &str,
    ) -> Result<BinScheme> {
        if breaks.len() != labels.len() + 1 {
            return Err(Error::Config(format!(
                "Expected {} breakpoints for {} labels, found {}",
                labels.len() + 1,
                labels.len(),
                breaks.len()
            )));
        }
        if breaks.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::Config(format!(
                "Breakpoints must be strictly increasing: {:?}",
                breaks
            )));
        }
        let distinct: HashSet<&String> = labels.iter().collect();
        if distinct.len() != labels.len() {
            return Err(Error::Config(format!(
                "Labels must be distinct: {:?}",
                labels
            )));
        }
        for (role, label) in [
            ("nucleosome-free", nucleosome_free),
            ("mononucleosome", mononucleosome),
        ] {
            if !labels.iter().any(|l| l == label) {
                return Err(Error::Config(format!(
                    "The {} label '{}' is not one of the bin labels",
                    role, label
                )));
            }
        }

        Ok(BinScheme {
            labels,
            breaks,
            nucleosome_free: nucleosome_free.to_string(),
            mononucleosome: mononucleosome.to_string(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn nucleosome_free_label(&self) -> &str {
        &self.nucleosome_free
    }

    pub fn mononucleosome_label(&self) -> &str {
        &self.mononucleosome
    }

    /// Index of the bin whose half-open range contains `size`.
    pub fn bin_of(&self, size: i64) -> Option<usize> {
        let size = size as f64;
        if size < self.breaks[0] || size >= self.breaks[self.breaks.len() - 1] {
            return None;
        }
        // breaks are strictly increasing, so the partition point is the bin
        let index = self.breaks.partition_point(|&b| b <= size);
        Some(index - 1)
    }
}

impl Default for BinScheme {
    fn default() -> BinScheme {
        BinScheme::new(
            DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_BREAKS.to_vec(),
            "NucleosomeFree",
            "mononucleosome",
        )
        .unwrap()
    }
}

/// Fragments partitioned into the bins of a scheme, in label order.
#[derive(Debug, Clone)]
pub struct SizeSplit {
    labels: Vec<String>,
    bins: Vec<Vec<Fragment>>,
}

impl SizeSplit {
    pub fn empty(scheme: &BinScheme) -> SizeSplit {
        SizeSplit {
            labels: scheme.labels().to_vec(),
            bins: vec![Vec::new(); scheme.labels().len()],
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn bin(&self, label: &str) -> Option<&[Fragment]> {
        let index = self.labels.iter().position(|l| l == label)?;
        Some(&self.bins[index])
    }

    /// Removes and returns the named bin's fragments.
    pub fn take_bin(&mut self, label: &str) -> Vec<Fragment> {
        match self.labels.iter().position(|l| l == label) {
            Some(index) => std::mem::take(&mut self.bins[index]),
            None => Vec::new(),
        }
    }

    pub fn set_bin(&mut self, label: &str, frags: Vec<Fragment>) {
        if let Some(index) = self.labels.iter().position(|l| l == label) {
            self.bins[index] = frags;
        }
    }

    pub fn append_bin(&mut self, label: &str, frags: &mut Vec<Fragment>) {
        if let Some(index) = self.labels.iter().position(|l| l == label) {
            self.bins[index].append(frags);
        }
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|bin| bin.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Fragment])> {
        self.labels
            .iter()
            .zip(self.bins.iter())
            .map(|(label, bin)| (label.as_str(), bin.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<Fragment>)> {
        self.labels
            .iter()
            .zip(self.bins.iter_mut())
            .map(|(label, bin)| (label.as_str(), bin))
    }
}

/// Partitions fragments into the scheme's bins by absolute template length.
///
/// Preconditions checked here: every fragment has a non-zero template
/// length, template names are unique, and every length falls inside the
/// breakpoint range.
pub fn split_by_size(frags: Vec<Fragment>, scheme: &BinScheme) -> Result<SizeSplit> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(frags.len());
    for frag in &frags {
        if frag.tlen == 0 {
            return Err(Error::Config(format!(
                "Fragment '{}' has no template length",
                frag.id
            )));
        }
        if !seen.insert(&frag.id) {
            return Err(Error::Config(format!(
                "Duplicate fragment name: '{}'",
                frag.id
            )));
        }
    }
    drop(seen);

    let mut split = SizeSplit {
        labels: scheme.labels().to_vec(),
        bins: vec![Vec::new(); scheme.labels().len()],
    };
    for frag in frags {
        let size = frag.size();
        match scheme.bin_of(size) {
            Some(index) => split.bins[index].push(frag),
            None => {
                return Err(Error::Config(format!(
                    "Fragment '{}' has template length {} outside the breakpoint range",
                    frag.id, size
                )))
            }
        }
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags_of_sizes(sizes: &[i64]) -> Vec<Fragment> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Fragment::new_for_test(&format!("f{}", i), "chr1", 1000, size))
            .collect()
    }

    #[test]
    fn default_scheme_is_valid() {
        let scheme = BinScheme::default();
        assert_eq!(scheme.labels().len(), 8);
        assert_eq!(scheme.nucleosome_free_label(), "NucleosomeFree");
        assert_eq!(scheme.mononucleosome_label(), "mononucleosome");
    }

    #[test]
    fn scheme_rejects_breakpoint_count_mismatch() {
        let result = BinScheme::new(
            vec!["a".into(), "b".into()],
            vec![0.0, 100.0],
            "a",
            "b",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn scheme_rejects_non_increasing_breaks() {
        let result = BinScheme::new(
            vec!["a".into(), "b".into()],
            vec![0.0, 100.0, 100.0],
            "a",
            "b",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn scheme_rejects_duplicate_labels() {
        let result = BinScheme::new(
            vec!["a".into(), "a".into()],
            vec![0.0, 100.0, 200.0],
            "a",
            "a",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn scheme_rejects_unknown_designated_labels() {
        let result = BinScheme::new(
            vec!["a".into(), "b".into()],
            vec![0.0, 100.0, 200.0],
            "a",
            "c",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn split_matches_expected_default_bins() {
        let sizes = [50, 150, 200, 300, 500, 600, 620, 700];
        let expected = [
            "NucleosomeFree",
            "inter1",
            "mononucleosome",
            "inter2",
            "dinucleosome",
            "inter3",
            "trinucleosome",
            "others",
        ];
        let split = split_by_size(frags_of_sizes(&sizes), &BinScheme::default()).unwrap();
        for (i, label) in expected.iter().enumerate() {
            let bin = split.bin(label).unwrap();
            assert_eq!(bin.len(), 1, "bin {}", label);
            assert_eq!(bin[0].id, format!("f{}", i));
        }
    }

    #[test]
    fn split_preserves_every_fragment_exactly_once() {
        let sizes = [50, 150, 200, 300, 500, 600, 620, 700, 75, 201];
        let split = split_by_size(frags_of_sizes(&sizes), &BinScheme::default()).unwrap();
        assert_eq!(split.total(), sizes.len());

        let mut ids: Vec<String> = split
            .iter()
            .flat_map(|(_, bin)| bin.iter().map(|f| f.id.clone()))
            .collect();
        ids.sort();
        let mut expected: Vec<String> = (0..sizes.len()).map(|i| format!("f{}", i)).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn split_is_idempotent() {
        let sizes = [50, 150, 200, 300, 500];
        let first = split_by_size(frags_of_sizes(&sizes), &BinScheme::default()).unwrap();
        let second = split_by_size(frags_of_sizes(&sizes), &BinScheme::default()).unwrap();
        for ((label_a, bin_a), (label_b, bin_b)) in first.iter().zip(second.iter()) {
            assert_eq!(label_a, label_b);
            assert_eq!(bin_a, bin_b);
        }
    }

    #[test]
    fn length_at_breakpoint_falls_into_higher_bin() {
        let scheme = BinScheme::default();
        let finite_breaks = &DEFAULT_BREAKS[1..DEFAULT_BREAKS.len() - 1];
        for (i, &breakpoint) in finite_breaks.iter().enumerate() {
            let split =
                split_by_size(frags_of_sizes(&[breakpoint as i64]), &scheme).unwrap();
            let higher_label = &scheme.labels()[i + 1];
            assert_eq!(
                split.bin(higher_label).unwrap().len(),
                1,
                "length {} should fall into '{}'",
                breakpoint,
                higher_label
            );
        }
    }

    #[test]
    fn split_rejects_missing_template_length() {
        let result = split_by_size(frags_of_sizes(&[0]), &BinScheme::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn split_rejects_duplicate_names() {
        let mut frags = frags_of_sizes(&[100, 200]);
        frags[1].id = frags[0].id.clone();
        let result = split_by_size(frags, &BinScheme::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn split_uses_absolute_template_length() {
        let split = split_by_size(frags_of_sizes(&[-200]), &BinScheme::default()).unwrap();
        assert_eq!(split.bin("mononucleosome").unwrap().len(), 1);
    }

    #[test]
    fn split_rejects_length_outside_breakpoint_range() {
        let scheme = BinScheme::new(
            vec!["short".into(), "long".into()],
            vec![0.0, 100.0, 200.0],
            "short",
            "long",
        )
        .unwrap();
        let result = split_by_size(frags_of_sizes(&[500]), &scheme);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
