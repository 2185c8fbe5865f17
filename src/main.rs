use clap::Parser;
use grid_quantizer::cli::{run, Cli};
use grid_quantizer::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
