//! Module for representing sequenced fragments extracted from alignment records.

use crate::utils::{GenomicInterval, Strand};
use rust_htslib::bam::{self, record::Cigar, record::CigarString};
use std::str;
use std::sync::Arc;

const FLAG_REVERSE: u16 = 0x10;

/// One sequenced fragment, holding everything needed to rebuild its
/// alignment record. Identity is the template name; the categorization
/// stage requires names to be unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Template name.
    pub id: String,
    /// Contig name, shared across fragments of the same contig.
    pub contig: Arc<str>,
    /// BAM target id of the contig.
    pub tid: i32,
    /// Leftmost aligned position (0-based).
    pub pos: i64,
    /// End of the aligned portion (exclusive).
    pub aln_end: i64,
    /// Signed template length; the magnitude is the fragment size.
    pub tlen: i64,
    pub mapq: u8,
    pub flags: u16,
    pub mtid: i32,
    pub mpos: i64,
    pub cigar: Vec<Cigar>,
    pub bases: Vec<u8>,
    pub quals: Vec<u8>,
}

impl Fragment {
    pub fn from_hts_rec(rec: &bam::Record, contig: &Arc<str>) -> Fragment {
        use rust_htslib::bam::ext::BamRecordExtensions;

        Fragment {
            id: str::from_utf8(rec.qname()).unwrap().to_string(),
            contig: Arc::clone(contig),
            tid: rec.tid(),
            pos: rec.pos(),
            aln_end: rec.reference_end(),
            tlen: rec.insert_size(),
            mapq: rec.mapq(),
            flags: rec.flags(),
            mtid: rec.mtid(),
            mpos: rec.mpos(),
            cigar: rec.cigar().take().to_vec(),
            bases: rec.seq().as_bytes(),
            quals: rec.qual().to_vec(),
        }
    }

    pub fn to_hts_rec(&self) -> bam::Record {
        let mut rec = bam::Record::new();
        let cigar = if self.cigar.is_empty() {
            None
        } else {
            Some(CigarString(self.cigar.clone()))
        };
        rec.set(self.id.as_bytes(), cigar.as_ref(), &self.bases, &self.quals);
        rec.set_tid(self.tid);
        rec.set_pos(self.pos);
        rec.set_mapq(self.mapq);
        rec.set_flags(self.flags);
        rec.set_mtid(self.mtid);
        rec.set_mpos(self.mpos);
        rec.set_insert_size(self.tlen);
        rec
    }

    pub fn is_reverse(&self) -> bool {
        self.flags & FLAG_REVERSE != 0
    }

    pub fn strand(&self) -> Strand {
        if self.is_reverse() {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    /// Absolute template length.
    pub fn size(&self) -> i64 {
        self.tlen.abs()
    }

    /// Genomic extent of the whole template: [pos, pos + tlen) for the
    /// leftmost mate, [aln_end - |tlen|, aln_end) for the rightmost.
    pub fn span(&self) -> GenomicInterval {
        let (start, end) = if self.tlen >= 0 {
            (self.pos, self.pos + self.tlen)
        } else {
            (self.aln_end + self.tlen, self.aln_end)
        };
        GenomicInterval {
            contig: Arc::clone(&self.contig),
            start: start.max(0) as u32,
            end: end.max(0) as u32,
            strand: self.strand(),
        }
    }

    /// Drops the base and quality payloads, keeping the coordinate fields.
    /// Used to reclaim memory once a category has been serialized.
    pub fn strip_payload(&mut self) {
        self.bases = Vec::new();
        self.quals = Vec::new();
    }

    #[cfg(test)]
    pub fn new_for_test(id: &str, contig: &str, pos: i64, tlen: i64) -> Fragment {
        Fragment {
            id: id.to_string(),
            contig: Arc::from(contig),
            tid: 0,
            pos,
            aln_end: pos + 50,
            tlen,
            mapq: 60,
            flags: 0x2 | 0x1,
            mtid: 0,
            mpos: pos + tlen.abs() - 50,
            cigar: Vec::new(),
            bases: b"ACGT".to_vec(),
            quals: vec![30; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_of_leftmost_mate_runs_forward() {
        let frag = Fragment::new_for_test("f1", "chr1", 1000, 180);
        let span = frag.span();
        assert_eq!((span.start, span.end), (1000, 1180));
        assert_eq!(span.strand, Strand::Forward);
    }

    #[test]
    fn span_of_rightmost_mate_runs_backward_from_aln_end() {
        let mut frag = Fragment::new_for_test("f1", "chr1", 1130, -180);
        frag.flags |= FLAG_REVERSE;
        let span = frag.span();
        // aln_end = 1130 + 50
        assert_eq!((span.start, span.end), (1000, 1180));
        assert_eq!(span.strand, Strand::Reverse);
    }

    #[test]
    fn span_clamps_at_contig_start() {
        let mut frag = Fragment::new_for_test("f1", "chr1", 10, -180);
        frag.aln_end = 60;
        assert_eq!(frag.span().start, 0);
    }

    #[test]
    fn strip_payload_clears_sequence_only() {
        let mut frag = Fragment::new_for_test("f1", "chr1", 1000, 180);
        frag.strip_payload();
        assert!(frag.bases.is_empty());
        assert!(frag.quals.is_empty());
        assert_eq!(frag.size(), 180);
    }
}
