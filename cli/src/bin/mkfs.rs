use anyhow::Result;
use clap::Parser;
use diskforge_cli::mkfs::{run, MkfsArgs};
use diskforge_cli::setup_default_tracing;

fn main() -> Result<()> {
    let args = MkfsArgs::parse();
    setup_default_tracing();
    run(&args)?;
    Ok(())
}
