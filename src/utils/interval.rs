use crate::utils::{Error, Result};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    Unstranded,
}

impl Strand {
    pub fn from_symbol(symbol: &str) -> Strand {
        match symbol {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            _ => Strand::Unstranded,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
            Strand::Unstranded => "*",
        };
        write!(f, "{}", symbol)
    }
}

/// A half-open genomic interval [start, end) on a named contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub contig: Arc<str>,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

impl GenomicInterval {
    pub fn new(contig: impl Into<Arc<str>>, start: u32, end: u32, strand: Strand) -> Result<Self> {
        if end < start {
            return Err(Error::Config(format!(
                "Invalid interval: start {} > end {}",
                start, end
            )));
        }

        Ok(Self {
            contig: contig.into(),
            start,
            end,
            strand,
        })
    }

    pub fn width(&self) -> u32 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> u32 {
        self.start + self.width() / 2
    }

    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.contig == other.contig && self.start < other.end && other.start < self.end
    }

    /// Re-centers the interval on its midpoint at the given width,
    /// clamping at the start of the contig.
    pub fn recenter(&self, width: u32) -> GenomicInterval {
        let mid = self.midpoint();
        let half = width / 2;
        let start = mid.saturating_sub(half);
        GenomicInterval {
            contig: Arc::clone(&self.contig),
            start,
            end: start + width,
            strand: self.strand,
        }
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.contig, self.start, self.end, self.strand)
    }
}

/// An interval carrying a numeric annotation (e.g. a mean-coverage score).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredInterval {
    pub interval: GenomicInterval,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: u32, end: u32) -> GenomicInterval {
        GenomicInterval::new("chr1", start, end, Strand::Unstranded).unwrap()
    }

    #[test]
    fn init_interval_from_invalid_bounds_err() {
        assert!(GenomicInterval::new("chr1", 200, 100, Strand::Forward).is_err());
    }

    #[test]
    fn zero_width_interval_ok() {
        let interval = iv(100, 100);
        assert_eq!(interval.width(), 0);
    }

    #[test]
    fn overlap_requires_same_contig() {
        let a = iv(100, 200);
        let b = GenomicInterval::new("chr2", 100, 200, Strand::Unstranded).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&iv(199, 300)));
        assert!(!a.overlaps(&iv(200, 300)));
    }

    #[test]
    fn recenter_fixes_width_around_midpoint() {
        let recentered = iv(100, 300).recenter(80);
        assert_eq!((recentered.start, recentered.end), (160, 240));
    }

    #[test]
    fn recenter_clamps_at_contig_start() {
        let recentered = iv(0, 20).recenter(80);
        assert_eq!((recentered.start, recentered.end), (0, 80));
    }
}
