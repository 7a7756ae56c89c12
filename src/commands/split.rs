use crate::cli::SplitArgs;
use crate::fragments::{
    split_by_size, streaming, write, BinScheme, FragmentReader, SizeSplit, DEFAULT_BREAKS,
    DEFAULT_LABELS,
};
use crate::refine::{
    refine_split, BedGraphConservation, FaidxSequenceSource, FeatureParams, RandomForest,
    RefineParams, TrainingParams,
};
use crate::utils::{read_bed_intervals, Error, Result};

pub fn split(args: SplitArgs) -> Result<()> {
    let scheme = build_scheme(&args)?;

    let refinement = match (&args.genome_path, &args.conservation_path, &args.tss_path) {
        (Some(genome), Some(conservation), Some(tss)) => Some((genome, conservation, tss)),
        (None, None, None) => None,
        _ => {
            return Err(Error::Config(
                "Refinement requires --genome, --conservation, and --tss together".to_string(),
            ))
        }
    };

    if args.streaming {
        if refinement.is_some() {
            return Err(Error::Config(
                "Streaming mode does not support classifier refinement".to_string(),
            ));
        }
        let out_dir = args.out_dir.as_ref().ok_or_else(|| {
            Error::Config("Streaming mode requires --out-dir".to_string())
        })?;
        let split =
            streaming::split_by_size_streaming(&args.reads_path, &scheme, args.chunk_size, out_dir)?;
        log_summary(&split);
        return Ok(());
    }

    let (header, frags) = FragmentReader::open(&args.reads_path)?.read_all()?;
    log::info!("Read {} fragments from {}", frags.len(), args.reads_path.display());
    let mut split = split_by_size(frags, &scheme)?;

    if let Some((genome, conservation, tss)) = refinement {
        let transcripts = read_bed_intervals(tss)?;
        let sequences = FaidxSequenceSource::open(genome)?;
        let conservation = BedGraphConservation::open(conservation)?;
        let params = RefineParams {
            cutoff: args.cutoff,
            training: TrainingParams {
                fraction: args.training_fraction,
                ..Default::default()
            },
            features: FeatureParams {
                chunk_size: args.chunk_size,
                aggregator: args.aggregator,
            },
        };
        split = refine_split::<RandomForest, _, _>(
            split,
            &scheme,
            &transcripts,
            &sequences,
            &conservation,
            &params,
        )?;
    }

    if let Some(out_dir) = &args.out_dir {
        write::write_split(&mut split, &header, out_dir)?;
    }
    log_summary(&split);
    Ok(())
}

fn build_scheme(args: &SplitArgs) -> Result<BinScheme> {
    let labels = args.labels.as_ref().map_or_else(
        || DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        |labels| labels.0.clone(),
    );
    let breaks = args
        .breaks
        .as_ref()
        .map_or_else(|| DEFAULT_BREAKS.to_vec(), |breaks| breaks.0.clone());
    BinScheme::new(
        labels,
        breaks,
        &args.nucleosome_free_label,
        &args.mononucleosome_label,
    )
}

fn log_summary(split: &SizeSplit) {
    for (label, bin) in split.iter() {
        log::info!("{}: {} fragments", label, bin.len());
    }
}
