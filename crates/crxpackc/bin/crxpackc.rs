use clap::Parser;
use crxpackc::cli::{self, Cli};
use tokio::runtime::Builder;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env_filter = cli::resolve_env_filter(&cli);

    crxpackc::telemetry::install(&env_filter)?;

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(cli::run_with_cli(cli))
}
