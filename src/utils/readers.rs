use crate::utils::{Error, GenomicInterval, Result, Strand};
use flate2::read::MultiGzDecoder;
use rust_htslib::faidx;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as ioRead};
use std::path::Path;

pub fn open_table_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(Error::Io(format!(
                "Invalid gzip header: {}",
                path.to_string_lossy()
            )))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

pub fn open_genome_reader(path: &Path) -> Result<faidx::Reader> {
    let extension = path.extension().unwrap().to_str().unwrap();
    let fai_path = path.with_extension(extension.to_owned() + ".fai");
    if !fai_path.exists() {
        return Err(Error::Io(format!(
            "Reference index file not found: {}. Create it using 'samtools faidx {}'",
            fai_path.display(),
            path.display()
        )));
    }
    faidx::Reader::from_path(path).map_err(|e| Error::Io(e.to_string()))
}

/// Reads transcript or region intervals from a BED file (plain or gzipped).
/// Strand is taken from column 6 when present, otherwise unstranded.
pub fn read_bed_intervals(path: &Path) -> Result<Vec<GenomicInterval>> {
    let reader = open_table_reader(path)?;
    let mut intervals = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            Error::Io(format!(
                "{}: error reading line {}: {}",
                path.display(),
                line_number + 1,
                e
            ))
        })?;
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(Error::Io(format!(
                "{}: expected at least 3 BED fields at line {}, found {}",
                path.display(),
                line_number + 1,
                fields.len()
            )));
        }

        let parse_coord = |value: &str| -> Result<u32> {
            value.parse().map_err(|_| {
                Error::Io(format!(
                    "{}: invalid coordinate '{}' at line {}",
                    path.display(),
                    value,
                    line_number + 1
                ))
            })
        };

        let start = parse_coord(fields[1])?;
        let end = parse_coord(fields[2])?;
        let strand = fields
            .get(5)
            .map_or(Strand::Unstranded, |s| Strand::from_symbol(s));

        intervals.push(GenomicInterval::new(fields[0], start, end, strand)?);
    }

    if intervals.is_empty() {
        return Err(Error::Io(format!(
            "{}: no intervals found",
            path.display()
        )));
    }

    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_bed_with_and_without_strand() {
        let mut file = tempfile::NamedTempFile::with_suffix(".bed").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "chr1\t100\t200\ttx1\t0\t+").unwrap();
        writeln!(file, "chr2\t500\t900").unwrap();
        file.flush().unwrap();

        let intervals = read_bed_intervals(file.path()).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].strand, Strand::Forward);
        assert_eq!(intervals[1].strand, Strand::Unstranded);
        assert_eq!((intervals[1].start, intervals[1].end), (500, 900));
    }

    #[test]
    fn read_bed_rejects_short_lines() {
        let mut file = tempfile::NamedTempFile::with_suffix(".bed").unwrap();
        writeln!(file, "chr1\t100").unwrap();
        file.flush().unwrap();
        assert!(read_bed_intervals(file.path()).is_err());
    }
}
