use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegan::{DevicePreference, GanConfig, render, train};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facegan", version, about = "Train a DCGAN on 32x32 CelebA faces")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train both networks and save the per-epoch generator samples
    Train {
        /// TOML config; defaults are used for anything it leaves out
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum)]
        device: Option<DeviceArg>,
    },
    /// Render one epoch of a sample history as a 2x8 PNG grid
    Render {
        #[arg(long, default_value = "train_samples.bin")]
        samples: PathBuf,
        /// 0-based epoch, defaults to the last one
        #[arg(long)]
        epoch: Option<usize>,
        #[arg(long, default_value = "samples.png")]
        out: PathBuf,
    },
    /// Write the default configuration
    Config {
        #[arg(long, default_value = "facegan.toml")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DeviceArg {
    Auto,
    Cpu,
    Gpu,
}

impl From<DeviceArg> for DevicePreference {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => DevicePreference::Auto,
            DeviceArg::Cpu => DevicePreference::Cpu,
            DeviceArg::Gpu => DevicePreference::Gpu,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Train {
            config,
            data_dir,
            epochs,
            seed,
            device,
        } => {
            let mut cfg = match &config {
                Some(path) => GanConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => GanConfig::default(),
            };
            if let Some(dir) = data_dir {
                cfg.data.data_dir = dir;
            }
            if let Some(n) = epochs {
                cfg.training.n_epochs = n;
            }
            if seed.is_some() {
                cfg.training.seed = seed;
            }
            if let Some(device) = device {
                cfg.training.device = device.into();
            }

            let losses = train::run(&cfg).context("training failed")?;
            if let Some((d, g)) = losses.mean() {
                info!(records = losses.len(), mean_d_loss = d, mean_g_loss = g, "training finished");
            }
        }
        Command::Render { samples, epoch, out } => {
            render::render_epoch(&samples, epoch, &out)
                .with_context(|| format!("rendering {}", samples.display()))?;
        }
        Command::Config { out } => {
            GanConfig::default()
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), "wrote default config");
        }
    }
    Ok(())
}
