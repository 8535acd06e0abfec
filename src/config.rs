//! Run configuration, read from and written to TOML.
//!
//! Every section and field has a default, so a config file only needs the
//! values it changes.

use crate::device::DevicePreference;
use crate::error::{FaceGanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Image size the networks are built for
pub const SUPPORTED_IMAGE_SIZE: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GanConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub optim: OptimConfig,
    pub training: TrainingConfig,
}

/// Where the images come from and how they are batched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub image_size: usize,
    pub batch_size: usize,
    pub shuffle: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("processed_celeba_small/celeba"),
            image_size: 32,
            batch_size: 32,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Depth of the first discriminator convolution
    pub d_conv_dim: usize,
    /// Depth of the last generator transposed convolution
    pub g_conv_dim: usize,
    /// Length of the latent vector
    pub z_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            d_conv_dim: 32,
            g_conv_dim: 32,
            z_size: 100,
        }
    }
}

/// Adam hyperparameters, shared by both networks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            lr: 0.0002,
            beta1: 0.5,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_epochs: usize,
    /// Record and log losses every N batches
    pub print_every: usize,
    /// Images generated from the fixed latent batch at the end of each epoch
    pub sample_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub device: DevicePreference,
    pub samples_path: PathBuf,
    /// Append every recorded loss pair to this CSV file as it happens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_log_path: Option<PathBuf>,
    /// Write both networks' state dicts here after training
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
    /// Draw a per-epoch progress bar on stderr
    pub progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_epochs: 200,
            print_every: 50,
            sample_size: 16,
            seed: None,
            device: DevicePreference::Auto,
            samples_path: PathBuf::from("train_samples.bin"),
            loss_log_path: None,
            checkpoint_dir: None,
            progress: false,
        }
    }
}

impl GanConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GanConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Reject values the networks or the optimizer cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FaceGanError::InvalidConfig(msg));
        let sizes = [
            ("data.batch_size", self.data.batch_size),
            ("model.d_conv_dim", self.model.d_conv_dim),
            ("model.g_conv_dim", self.model.g_conv_dim),
            ("model.z_size", self.model.z_size),
            ("training.n_epochs", self.training.n_epochs),
            ("training.print_every", self.training.print_every),
            ("training.sample_size", self.training.sample_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return invalid(format!("{name} must be > 0"));
        }
        if self.data.image_size != SUPPORTED_IMAGE_SIZE {
            return invalid(format!(
                "data.image_size must be {SUPPORTED_IMAGE_SIZE}, got {}",
                self.data.image_size
            ));
        }
        if !(self.optim.lr > 0.0 && self.optim.lr.is_finite()) {
            return invalid(format!("optim.lr must be > 0, got {}", self.optim.lr));
        }
        for (name, beta) in [("optim.beta1", self.optim.beta1), ("optim.beta2", self.optim.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return invalid(format!("{name} must be in [0, 1), got {beta}"));
            }
        }
        if self.optim.eps <= 0.0 {
            return invalid(format!("optim.eps must be > 0, got {}", self.optim.eps));
        }
        Ok(())
    }
}
