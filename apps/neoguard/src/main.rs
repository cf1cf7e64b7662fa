//! # neoguard
//!
//! Binary entry point: parse the command line, install logging, run the
//! command and exit non-zero on failure.
//!
//! ```bash
//! neoguard run -i data/raw/neo_data.csv   # refine, score and store
//! neoguard status                         # portfolio KPIs
//! neoguard top -n 10                      # highest-risk objects
//! neoguard server --port 8080             # read-only dashboard API
//! ```

use clap::Parser;
use neoguard::cli;
use neoguard::telemetry::{self, LOG_FORMAT_ENV, LogFormat};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let format = LogFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    telemetry::init(format, cli.verbose);

    // JSON mode output must stay machine-readable.
    if !cli.quiet && !cli.json_mode {
        println!(
            "neoguard v{} - NEO refinement, risk scoring and pricing\n",
            env!("CARGO_PKG_VERSION")
        );
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}
