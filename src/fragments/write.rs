//! Writes categorized fragments to per-label BAM files.

use super::{Fragment, SizeSplit};
use crate::cli;
use crate::utils::{Error, Result};
use rust_htslib::bam::{self, header::HeaderRecord};
use std::env;
use std::path::{Path, PathBuf};

/// Serializes every non-empty bin of a split to `<outdir>/<label>.bam`
/// (plus a BAI index) and strips the in-memory payloads afterwards.
pub fn write_split(
    split: &mut SizeSplit,
    template_header: &bam::Header,
    out_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| Error::Io(format!("{}: {}", out_dir.display(), e)))?;

    for (label, bin) in split.iter_mut() {
        if bin.is_empty() {
            continue;
        }
        let path = bin_path(out_dir, label);
        write_bin(bin, template_header, &path)?;
        log::info!("Wrote {} fragments to {}", bin.len(), path.display());
        for frag in bin.iter_mut() {
            frag.strip_payload();
        }
    }
    Ok(())
}

pub fn bin_path(out_dir: &Path, label: &str) -> PathBuf {
    out_dir.join(format!("{}.bam", label))
}

pub fn write_bin(bin: &[Fragment], template_header: &bam::Header, path: &Path) -> Result<()> {
    let header = annotated_header(template_header.clone());
    let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    for frag in bin {
        writer
            .write(&frag.to_hts_rec())
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    }
    Ok(())
}

pub fn build_index(path: &Path) -> Result<()> {
    bam::index::build(path, None, bam::index::Type::Bai, 1)
        .map_err(|e| Error::Io(format!("Failed to index {}: {}", path.display(), e)))
}

fn annotated_header(template_header: bam::Header) -> bam::Header {
    let mut header = template_header;
    let args: Vec<String> = env::args().collect();
    let command_line = args.join(" ");

    let mut record = HeaderRecord::new(b"PG");
    record.push_tag(b"ID", env!("CARGO_PKG_NAME"));
    record.push_tag(b"PN", env!("CARGO_PKG_NAME"));
    record.push_tag(b"CL", command_line);
    record.push_tag(b"VN", (*cli::FULL_VERSION).to_string());
    header.push_record(&record);

    header
}
