use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skin_synth::{
    generate_skin_universe, generate_synthetic_skin, write_series_csv, write_universe_csv,
    CsvLayout,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Generate synthetic CS2 skin price data sets
#[derive(Parser, Debug)]
#[command(name = "generate-skins")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One random-walk skin, full and OHLC-only files
    Single {
        /// Number of days
        #[arg(short, long, default_value_t = 1000)]
        days: usize,

        /// Random seed
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,
    },
    /// Many skins with market dynamics in one long table
    Universe {
        /// Number of skins
        #[arg(long, default_value_t = 500)]
        skins: usize,

        /// Number of days per skin
        #[arg(short, long, default_value_t = 1000)]
        days: usize,

        /// Random seed
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Single {
            days,
            seed,
            out_dir,
        } => {
            let bars = generate_synthetic_skin(days, seed).context("generating skin")?;

            let full_path = out_dir.join("synthetic_skin_full.csv");
            write_series_csv(&full_path, &bars, CsvLayout::Full)
                .with_context(|| format!("writing {}", full_path.display()))?;
            let ohlc_path = out_dir.join("synthetic_skin_data.csv");
            write_series_csv(&ohlc_path, &bars, CsvLayout::Ohlc)
                .with_context(|| format!("writing {}", ohlc_path.display()))?;

            tracing::info!(days, seed, "Synthetic skin generated");
            println!("OHLC:              {}", ohlc_path.display());
            println!("OHLC+volume+amount: {}", full_path.display());
        }
        Command::Universe {
            skins,
            days,
            seed,
            out_dir,
        } => {
            tracing::info!(skins, days, "Generating skin universe");
            let universe = generate_skin_universe(skins, days, seed).context("generating universe")?;

            let full_path = out_dir.join(format!("synthetic_{}_skins_full.csv", skins));
            write_universe_csv(&full_path, &universe, CsvLayout::Full)
                .with_context(|| format!("writing {}", full_path.display()))?;
            let ohlc_path = out_dir.join(format!("synthetic_{}_skins_ohlc.csv", skins));
            write_universe_csv(&ohlc_path, &universe, CsvLayout::Ohlc)
                .with_context(|| format!("writing {}", ohlc_path.display()))?;

            println!("Full table: {}", full_path.display());
            println!("OHLC table: {}", ohlc_path.display());
        }
    }

    println!("Synthetic data only; it carries no real market information.");
    Ok(())
}
