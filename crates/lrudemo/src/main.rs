//! lrudemo - replays a key pattern through the LRU cache and reports statistics

mod driver;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::driver::{Pattern, SquareProvider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of entries)
    #[arg(short, long, default_value_t = 4)]
    capacity: usize,

    /// Number of passes over the key list
    #[arg(short, long, default_value_t = 100_000)]
    rounds: u64,

    /// Consecutive fetches of each key per pass
    #[arg(short = 'p', long, default_value_t = 2)]
    repeat: u32,

    /// Keys to fetch, in order
    #[arg(allow_negative_numbers = true, default_values_t = [2, 3])]
    keys: Vec<i64>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting lrudemo v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);
    info!("Keys: {:?} x{} per round, {} rounds", args.keys, args.repeat, args.rounds);

    let pattern = Pattern {
        keys: args.keys,
        repeat: args.repeat,
        rounds: args.rounds,
    };
    let report = driver::run(args.capacity, SquareProvider::default(), &pattern)?;

    println!("Capacity:        {}", report.capacity);
    println!("Fetches:         {}", report.fetches);
    println!("Hits:            {}", report.hits);
    println!("Hit ratio:       {}", report.hit_ratio);
    println!("Evictions:       {}", report.evictions);
    println!("Computed values: {}", report.registered);

    Ok(())
}
