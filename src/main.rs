use std::path::PathBuf;

use clap::Parser;

use serversage::config::{load_config, loader::parse_config};

#[derive(Parser, Debug)]
#[command(name = "serversage", version, about = "Traced CRUD API with error correlation")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };

    serversage::lifecycle::run(config).await?;
    Ok(())
}
