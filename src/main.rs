use anyhow::Result;
use clap::Parser;
use simdeck::cli;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        // Logging may not be up yet (bad config), so report directly.
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
