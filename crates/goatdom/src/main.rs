use clap::Parser;

use goatdom::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    goatdom::init(cli.log_level());
    cli::run(cli).await
}
