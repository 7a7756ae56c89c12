use crate::cli::TssArgs;
use crate::fragments::FragmentReader;
use crate::tss::{score_tss_enrichment, TssEnrichment, TssParams};
use crate::utils::{read_bed_intervals, Error, Result};
use std::io::Write;

pub fn tss(args: TssArgs) -> Result<()> {
    let (_, frags) = FragmentReader::open(&args.reads_path)?.read_all()?;
    log::info!("Read {} fragments from {}", frags.len(), args.reads_path.display());
    let transcripts = read_bed_intervals(&args.tss_path)?;
    log::info!(
        "Read {} transcript intervals from {}",
        transcripts.len(),
        args.tss_path.display()
    );

    let params = TssParams {
        upstream: args.upstream,
        downstream: args.downstream,
        end_size: args.end_size,
        window_width: args.window_width,
        window_step: args.window_step,
        pseudocount: args.pseudocount,
        smooth_span: args.smooth_span,
    };
    let enrichment = score_tss_enrichment(&frags, &transcripts, &params)?;
    drop(frags);

    if let Some(profile_path) = &args.profile_path {
        write_profile(&enrichment, &params, profile_path)?;
        log::info!("Wrote enrichment profile to {}", profile_path.display());
    }

    log::info!("TSS enrichment score: {:.4}", enrichment.score);
    println!("{:.4}", enrichment.score);
    Ok(())
}

fn write_profile(
    enrichment: &TssEnrichment,
    params: &TssParams,
    path: &std::path::Path,
) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    writeln!(file, "offset\tprofile\tsmoothed").map_err(Error::from)?;
    for (bin, (raw, smoothed)) in enrichment
        .profile
        .iter()
        .zip(&enrichment.smoothed)
        .enumerate()
    {
        let offset = bin as i64 * params.window_step as i64 - params.upstream as i64;
        writeln!(file, "{}\t{}\t{}", offset, raw, smoothed).map_err(Error::from)?;
    }
    Ok(())
}
