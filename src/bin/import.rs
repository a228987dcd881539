//! Importer binary

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use imdb2meta::ingest::{self, IngestOptions};
use imdb2meta::store::{self, OpenMode, StoreConfig};
use imdb2meta::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "imdb2meta-import")]
#[command(about = "Imports IMDb title metadata from a TSV dump into an embedded key-value store")]
struct Args {
    /// Path to the "data.tsv" file that's inside the "title.basics.tsv.gz" archive
    #[arg(long)]
    tsv_path: PathBuf,

    /// Path to the sled DB directory
    #[arg(long)]
    sled_path: Option<PathBuf>,

    /// Path to the RocksDB directory
    #[arg(long)]
    rocks_path: Option<PathBuf>,

    /// Limit the number of rows to process, excluding the header row (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    limit: u64,

    /// Skip storing individual TV episodes
    #[arg(long)]
    skip_episodes: bool,

    /// Skip title types like "videoGame", "audiobook" and "radioSeries"
    #[arg(long)]
    skip_misc: bool,

    /// Only store minimal metadata (ID, type, title, release/start year)
    #[arg(long)]
    minimal: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "import failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let store_config = StoreConfig::from_paths(args.sled_path.clone(), args.rocks_path.clone())?;
    let file = File::open(&args.tsv_path).map_err(|e| {
        Error::Config(format!(
            "couldn't open TSV file {}: {e}",
            args.tsv_path.display()
        ))
    })?;
    let options = IngestOptions {
        limit: args.limit,
        skip_episodes: args.skip_episodes,
        skip_misc: args.skip_misc,
        minimal: args.minimal,
    };

    let store = store::open(&store_config, OpenMode::ReadWrite)?;
    // Close the store even when the run aborts mid-file, so an aborted import
    // never leaves the engine files mid-transaction.
    let result = ingest::run(BufReader::new(file), store.as_ref(), &options);
    let closed = store.close();
    result?;
    closed
}
