use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = trophy_journey_cli::Cli::parse();
    trophy_journey_cli::run_cli(cli)
}
