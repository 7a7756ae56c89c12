//! Chunked categorization for alignment sets too large to hold in memory.
//!
//! The source BAM is read strictly sequentially, one chunk at a time; each
//! chunk goes through the regular in-memory categorization and its bins
//! are spilled to per-category temporary BAM files. After the source is
//! exhausted the spill files are merged into `<outdir>/<label>.bam`,
//! indexed, and reloaded. A crash mid-stream can leave spill files behind;
//! this is a batch tool, not a resumable pipeline.

use super::read::FragmentReader;
use super::write::{bin_path, build_index, write_bin};
use super::{split_by_size, BinScheme, SizeSplit};
use crate::utils::{Error, Result};
use rust_htslib::bam::{self, Read};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Refinement is not available in streaming mode; callers must reject the
/// combination before getting here.
pub fn split_by_size_streaming(
    bam_path: &Path,
    scheme: &BinScheme,
    chunk_size: usize,
    out_dir: &Path,
) -> Result<SizeSplit> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| Error::Io(format!("{}: {}", out_dir.display(), e)))?;
    let spill_dir = tempfile::Builder::new()
        .prefix(".fragsift-spill-")
        .tempdir_in(out_dir)
        .map_err(|e| Error::Io(format!("Failed to create spill directory: {}", e)))?;

    let mut reader = FragmentReader::open(bam_path)?;
    let header = reader.header().clone();

    let mut spill_files: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let mut chunk_index = 0usize;
    loop {
        let chunk = reader.next_chunk(chunk_size)?;
        if chunk.is_empty() {
            break;
        }
        let num_read = chunk.len();
        let split = split_by_size(chunk, scheme)?;
        for (label, bin) in split.iter() {
            if bin.is_empty() {
                continue;
            }
            let path = spill_dir
                .path()
                .join(format!("{}.{}.bam", label, chunk_index));
            write_bin(bin, &header, &path)?;
            spill_files.entry(label.to_string()).or_default().push(path);
        }
        log::debug!("Categorized chunk {} ({} fragments)", chunk_index, num_read);
        chunk_index += 1;
    }
    reader.log_skipped();

    let mut split = SizeSplit::empty(scheme);
    for label in scheme.labels() {
        let parts = match spill_files.get(label.as_str()) {
            Some(parts) => parts,
            None => continue,
        };
        let dest = bin_path(out_dir, label);
        if parts.len() == 1 {
            std::fs::copy(&parts[0], &dest)
                .map_err(|e| Error::Io(format!("{}: {}", dest.display(), e)))?;
        } else {
            merge_parts(parts, &header, &dest)?;
        }
        build_index(&dest)?;

        let (_, mut frags) = FragmentReader::open(&dest)?.read_all()?;
        frags.sort_by(|a, b| a.id.cmp(&b.id));
        for frag in &mut frags {
            frag.strip_payload();
        }
        log::info!("Wrote {} fragments to {}", frags.len(), dest.display());
        split.set_bin(label, frags);
    }

    // spill_dir drops here, removing the per-chunk files
    Ok(split)
}

fn merge_parts(parts: &[PathBuf], header: &bam::Header, dest: &Path) -> Result<()> {
    let mut writer = bam::Writer::from_path(dest, header, bam::Format::Bam)
        .map_err(|e| Error::Io(format!("{}: {}", dest.display(), e)))?;
    for part in parts {
        let mut reader = bam::Reader::from_path(part)
            .map_err(|e| Error::Io(format!("{}: {}", part.display(), e)))?;
        let mut record = bam::Record::new();
        while let Some(result) = reader.read(&mut record) {
            result.map_err(|e| Error::Io(e.to_string()))?;
            writer
                .write(&record)
                .map_err(|e| Error::Io(format!("{}: {}", dest.display(), e)))?;
        }
    }
    Ok(())
}
