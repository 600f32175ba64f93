use anyhow::Result;
use clap::Parser;
use diskforge_cli::mkdi::{run, MkdiArgs};
use diskforge_cli::setup_default_tracing;

fn main() -> Result<()> {
    let args = MkdiArgs::parse();
    setup_default_tracing();
    run(&args)?;
    Ok(())
}
