use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use segscan::cli::cat::BatchFilter;

#[derive(Parser)]
#[command(name = "segscan")]
#[command(about = "Inspect textual segment dumps from a commit-log broker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every batch, and every record when the dump has them
    Cat {
        /// Dump files produced by the broker's log dump tool
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only batches written by this producer id
        #[arg(long)]
        pid: Option<i64>,

        /// Only batches written by this producer epoch
        #[arg(long)]
        producer_epoch: Option<i16>,

        /// Only batches appended under this leader epoch
        #[arg(long)]
        leader_epoch: Option<i32>,
    },
    /// Summarize transactional activity
    Txn {
        /// Dump files produced by the broker's log dump tool
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Emit the summaries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Cat {
            files,
            pid,
            producer_epoch,
            leader_epoch,
        } => segscan::cli::cat::run(
            files,
            &BatchFilter {
                producer_id: pid,
                producer_epoch,
                leader_epoch,
            },
        ),
        Commands::Txn { files, json } => segscan::cli::txn::run(files, json),
    };

    if let Err(err) = result {
        eprintln!("segscan: {err}");
        std::process::exit(1);
    }
}
