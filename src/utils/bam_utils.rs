use crate::utils::{Error, Result};
use rust_htslib::bam::{self, Read};
use std::path::Path;
use std::sync::Arc;

pub fn get_bam_header(bam_path: &Path) -> Result<bam::Header> {
    let bam = bam::Reader::from_path(bam_path)
        .map_err(|e| Error::Io(format!("Failed to create bam reader: {}", e)))?;
    Ok(bam::Header::from_template(bam.header()))
}

pub fn is_bam_mapped(bam_header: &bam::Header) -> bool {
    // If the input is mapped, the header carries SQ lines for its contigs
    for line in String::from_utf8(bam_header.to_bytes()).unwrap().lines() {
        if line.starts_with("@SQ") {
            return true;
        }
    }
    false
}

/// Contig names indexed by BAM target id, shared across fragments.
pub fn contig_names(header: &bam::HeaderView) -> Vec<Arc<str>> {
    header
        .target_names()
        .iter()
        .map(|name| Arc::from(std::str::from_utf8(name).unwrap()))
        .collect()
}
