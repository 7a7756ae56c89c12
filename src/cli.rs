use crate::refine::Aggregator;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

type Result<T> = std::result::Result<T, String>;

#[derive(Parser)]
#[command(name="fragsift",
          version=&**FULL_VERSION,
          about = "Nucleosome-aware categorization of ATAC-seq fragments",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Fragment Size Categorizer")]
    Split(SplitArgs),
    #[clap(about = "TSS Enrichment Scorer")]
    Tss(TssArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("split")))]
#[command(arg_required_else_help(true))]
pub struct SplitArgs {
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reads")]
    #[clap(help = "BAM file with aligned paired-end fragments")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_path: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "out-dir")]
    #[clap(help = "Directory for the per-category BAM files")]
    #[clap(value_name = "OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    #[clap(long = "genome")]
    #[clap(short = 'g')]
    #[clap(value_name = "FASTA")]
    #[clap(help = "Reference genome FASTA (enables classifier refinement)")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: Option<PathBuf>,

    #[clap(long = "conservation")]
    #[clap(short = 'c')]
    #[clap(value_name = "BEDGRAPH")]
    #[clap(help = "Per-base conservation scores as bedGraph (enables classifier refinement)")]
    #[arg(value_parser = check_file_exists)]
    pub conservation_path: Option<PathBuf>,

    #[clap(long = "tss")]
    #[clap(short = 't')]
    #[clap(value_name = "TSS")]
    #[clap(help = "BED file with transcript intervals (enables classifier refinement)")]
    #[arg(value_parser = check_file_exists)]
    pub tss_path: Option<PathBuf>,

    #[clap(long = "streaming")]
    #[clap(help = "Categorize in fixed-size chunks instead of loading all records")]
    pub streaming: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "breaks")]
    #[clap(value_name = "BREAKS")]
    #[clap(help = "Comma-separated breakpoints; one more than there are labels ('inf' allowed last)")]
    #[arg(value_parser = breaks_from_string)]
    pub breaks: Option<Breaks>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "labels")]
    #[clap(value_name = "LABELS")]
    #[clap(help = "Comma-separated category labels, ordered by fragment size")]
    #[arg(value_parser = labels_from_string)]
    pub labels: Option<Labels>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "nucleosome-free-label")]
    #[clap(value_name = "LABEL")]
    #[clap(help = "Label holding nucleosome-free fragments")]
    #[clap(default_value = "NucleosomeFree")]
    pub nucleosome_free_label: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "mononucleosome-label")]
    #[clap(value_name = "LABEL")]
    #[clap(help = "Label holding mononucleosome fragments")]
    #[clap(default_value = "mononucleosome")]
    pub mononucleosome_label: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "cutoff")]
    #[clap(value_name = "PROB")]
    #[clap(help = "Class probability required to reassign a fragment")]
    #[clap(default_value = "0.8")]
    #[arg(value_parser = ensure_unit_float)]
    pub cutoff: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "training-fraction")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Fraction of positive-depth positions kept above the training threshold")]
    #[clap(default_value = "0.1")]
    #[arg(value_parser = ensure_unit_float)]
    pub training_fraction: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "aggregator")]
    #[clap(value_name = "AGGREGATOR")]
    #[clap(help = "Conservation summary statistic (mean, min, or max)")]
    #[clap(default_value = "mean")]
    pub aggregator: Aggregator,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "chunk-size")]
    #[clap(value_name = "CHUNK_SIZE")]
    #[clap(help = "Records per chunk in streaming mode and per conservation lookup")]
    #[clap(default_value = "100000")]
    pub chunk_size: usize,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("tss")))]
#[command(arg_required_else_help(true))]
pub struct TssArgs {
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reads")]
    #[clap(help = "BAM file with aligned paired-end fragments")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 't')]
    #[clap(long = "tss")]
    #[clap(help = "BED file with transcript intervals")]
    #[clap(value_name = "TSS")]
    #[arg(value_parser = check_file_exists)]
    pub tss_path: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "profile")]
    #[clap(help = "Output TSV for the aggregate enrichment profile")]
    #[clap(value_name = "PROFILE")]
    #[arg(value_parser = check_prefix_path)]
    pub profile_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "upstream")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Promoter window extent upstream of the TSS")]
    #[clap(default_value = "1000")]
    pub upstream: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "downstream")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Promoter window extent downstream of the TSS")]
    #[clap(default_value = "1000")]
    pub downstream: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "end-size")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Flank size at the window extremes used as the noise level")]
    #[clap(default_value = "100")]
    pub end_size: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "window")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Sliding window width")]
    #[clap(default_value = "100")]
    pub window_width: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "step")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Sliding window step")]
    #[clap(default_value = "100")]
    pub window_step: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "pseudocount")]
    #[clap(value_name = "PSEUDOCOUNT")]
    #[clap(help = "Uniform depth added to the coverage track")]
    #[clap(default_value = "0")]
    pub pseudocount: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "smooth-span")]
    #[clap(value_name = "SPAN")]
    #[clap(help = "Span fraction of the local-regression smoother")]
    #[clap(default_value = "0.3")]
    #[arg(value_parser = ensure_unit_float)]
    pub smooth_span: f64,
}

/// Parsed `--breaks` values; newtype so clap can carry a Vec.
#[derive(Debug, Clone)]
pub struct Breaks(pub Vec<f64>);

/// Parsed `--labels` values.
#[derive(Debug, Clone)]
pub struct Labels(pub Vec<String>);

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_prefix_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn breaks_from_string(s: &str) -> Result<Breaks> {
    let values: Vec<f64> = s
        .split(',')
        .map(|field| match field.trim() {
            "inf" | "Inf" => Ok(f64::INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|_| format!("Invalid breakpoint: {}", other)),
        })
        .collect::<Result<_>>()?;
    if values.len() < 2 {
        return Err(format!("Expected at least 2 breakpoints, got {}", s));
    }
    Ok(Breaks(values))
}

fn labels_from_string(s: &str) -> Result<Labels> {
    let values: Vec<String> = s
        .split(',')
        .map(|field| field.trim().to_string())
        .collect();
    if values.iter().any(|label| label.is_empty()) {
        return Err(format!("Empty label in: {}", s));
    }
    Ok(Labels(values))
}
