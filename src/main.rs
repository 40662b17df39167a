// Entrypoint for the boxpusher CLI.
// - Keeps `main` small: set up logging, parse flags and hand them to
//   `publish::run` along with the way to build the registry client.
// - Returns `anyhow::Result` so any failure is printed on stderr and the
//   process exits non-zero.

use boxpusher::{api::AtlasClient, cli::Args, publish};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut stdout = std::io::stdout().lock();

    // Token from `ATLAS_TOKEN`, registry from `ATLAS_URL` (optional). Not
    // read at all in `--test` mode.
    publish::run(args, AtlasClient::from_env, &mut stdout)?;
    Ok(())
}
