use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use skin_forecast::backend::{Device, DriftBackend};
use skin_forecast::data::DataLoader;
use skin_forecast::{ForecastConfig, SkinPredictor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Forecast CS2 skin price series from CSV files
#[derive(Parser, Debug)]
#[command(name = "skin-forecast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Command-line values that take precedence over the configuration file
#[derive(Args, Debug)]
struct Overrides {
    /// Number of days to forecast
    #[arg(short, long, global = true)]
    pred_days: Option<usize>,

    /// Sampling temperature
    #[arg(long, global = true)]
    temperature: Option<f64>,

    /// Nucleus sampling threshold
    #[arg(long, global = true)]
    top_p: Option<f64>,

    /// Number of sampled paths to average
    #[arg(long, global = true)]
    sample_count: Option<usize>,

    /// Seed for reproducible forecasts
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Compute device (cuda, mps, cpu)
    #[arg(long, global = true)]
    device: Option<Device>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast one series
    Single {
        /// Input CSV with timestamps, open, high, low, close[, volume, amount]
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV for the forecast
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forecast every series of a combined table
    Batch {
        /// Input CSV with an identifier column
        #[arg(short, long)]
        input: PathBuf,

        /// Identifier column
        #[arg(long)]
        id_column: Option<String>,

        /// Output CSV for the combined forecast
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Forecast series concurrently
        #[arg(long)]
        parallel: bool,
    },
}

fn load_config(cli: &Cli) -> Result<ForecastConfig> {
    let mut config = match &cli.config {
        Some(path) => ForecastConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ForecastConfig::default(),
    };

    let o = &cli.overrides;
    if let Some(days) = o.pred_days {
        config.predictor.pred_days = days;
    }
    if let Some(temperature) = o.temperature {
        config.predictor.temperature = temperature;
    }
    if let Some(top_p) = o.top_p {
        config.predictor.top_p = top_p;
    }
    if let Some(count) = o.sample_count {
        config.predictor.sample_count = count;
    }
    if o.seed.is_some() {
        config.predictor.seed = o.seed;
    }
    if o.device.is_some() {
        config.model.device = o.device;
    }
    if let Command::Batch {
        id_column: Some(id_column),
        ..
    } = &cli.command
    {
        config.batch.id_column = id_column.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let device = config.device().context("resolving compute device")?;
    tracing::info!("Using device: {}", device);

    let mut backend = DriftBackend::new(config.model_spec(), device);
    if let Some(seed) = config.predictor.seed {
        backend = backend.with_seed(seed);
    }
    let predictor = SkinPredictor::with_config(backend, config.predictor_config());
    let sampling = config.sampling();
    let pred_days = config.predictor.pred_days;

    match &cli.command {
        Command::Single { input, output } => {
            let history = DataLoader::from_csv(input)
                .with_context(|| format!("reading {}", input.display()))?;
            let forecast = predictor.predict(&history, pred_days, &sampling)?;

            let mut df = forecast.to_dataframe()?;
            println!("{}", df);
            if let Some(path) = output {
                DataLoader::write_csv(&mut df, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("Forecast saved to {}", path.display());
            }
        }
        Command::Batch {
            input,
            output,
            parallel,
            ..
        } => {
            let table = DataLoader::from_csv(input)
                .with_context(|| format!("reading {}", input.display()))?;
            let mut options = config.batch_options();
            options.parallel |= *parallel;

            let combined = predictor.predict_batch_with(
                &table,
                &config.batch.id_column,
                pred_days,
                &sampling,
                &options,
            )?;
            for (id, error) in combined.failures() {
                println!("failed: {} ({})", id, error);
            }
            println!(
                "{} series forecast, {} failed",
                combined.ids().len(),
                combined.failures().len()
            );

            let mut df = combined.to_dataframe()?;
            println!("{}", df.head(Some(20)));
            if let Some(path) = output {
                DataLoader::write_csv(&mut df, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("Forecasts saved to {}", path.display());
            }
        }
    }

    Ok(())
}
