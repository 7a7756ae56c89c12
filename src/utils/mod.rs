mod bam_utils;
mod error;
mod interval;
pub mod math;
mod readers;

pub use bam_utils::{contig_names, get_bam_header, is_bam_mapped};
pub use error::{handle_error_and_exit, Error, Result};
pub use interval::{GenomicInterval, ScoredInterval, Strand};
pub use readers::{open_genome_reader, open_table_reader, read_bed_intervals};
