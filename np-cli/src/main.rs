//! noise-pulse - simulate the Papineau/Cartier noise feed and manage analytics data.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "noise-pulse",
    version,
    about = "EV adoption and street noise simulator with consent-gated analytics"
)]
struct Cli {
    #[command(subcommand)]
    command: np_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    np_cmd::run(cli.command).await
}
