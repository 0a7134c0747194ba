use clap::Parser;

use housing_agent::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    housing_agent::commands::run(cli).await
}
