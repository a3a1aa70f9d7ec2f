// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, hand over to `ui::run`.
// - Runs on a single-threaded runtime; uploads are concurrent, not parallel.

use canvas_submit::{config::Args, ui};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over the --verbose flag.
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    ui::run(args).await
}
