use clap::Parser;
use fragsift::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{split, tss},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Split(_) => "split",
        Command::Tss(_) => "tss",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Split(args) => split::split(args)?,
        Command::Tss(args) => tss::tss(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
