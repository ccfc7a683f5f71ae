use anyhow::Result;
use burst_doe::cli;
use clap::Parser;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        eprintln!("burst-doe: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
