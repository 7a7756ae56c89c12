//! Sequential fragment extraction from BAM files.

use super::Fragment;
use crate::utils::{contig_names, Error, Result};
use rust_htslib::bam::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Pulls fragments out of a BAM file in file order. Only primary mapped
/// records with a positive template length become fragments (one record
/// per template, the leftmost mate), so template names stay unique.
pub struct FragmentReader {
    reader: bam::Reader,
    header: bam::Header,
    contigs: Vec<Arc<str>>,
    num_skipped: u64,
}

impl FragmentReader {
    pub fn open(path: &Path) -> Result<FragmentReader> {
        let reader = bam::Reader::from_path(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        let header = bam::Header::from_template(reader.header());
        let contigs = contig_names(reader.header());
        Ok(FragmentReader {
            reader,
            header,
            contigs,
            num_skipped: 0,
        })
    }

    pub fn header(&self) -> &bam::Header {
        &self.header
    }

    /// Reads the next chunk of up to `max_count` fragments. An empty
    /// chunk means the source is exhausted.
    pub fn next_chunk(&mut self, max_count: usize) -> Result<Vec<Fragment>> {
        let mut chunk = Vec::new();
        let mut record = bam::Record::new();
        while chunk.len() < max_count {
            match self.reader.read(&mut record) {
                Some(Ok(())) => {
                    if record.is_secondary()
                        || record.is_supplementary()
                        || record.is_unmapped()
                        || record.tid() < 0
                    {
                        continue;
                    }
                    if record.insert_size() <= 0 {
                        self.num_skipped += 1;
                        continue;
                    }
                    let contig = &self.contigs[record.tid() as usize];
                    chunk.push(Fragment::from_hts_rec(&record, contig));
                }
                Some(Err(err)) => return Err(Error::Io(err.to_string())),
                None => break,
            }
        }
        Ok(chunk)
    }

    /// Reads the entire source into memory.
    pub fn read_all(mut self) -> Result<(bam::Header, Vec<Fragment>)> {
        let mut frags = Vec::new();
        loop {
            let mut chunk = self.next_chunk(usize::MAX)?;
            if chunk.is_empty() {
                break;
            }
            frags.append(&mut chunk);
        }
        self.log_skipped();
        Ok((self.header, frags))
    }

    pub fn log_skipped(&self) {
        if self.num_skipped > 0 {
            log::debug!(
                "Skipped {} records without a usable template length",
                self.num_skipped
            );
        }
    }
}
