//! DCGAN face generation on a small reverse-mode autodiff engine.
//!
//! The engine (`tensor`, `autograd`, `ops`, `nn`) provides just what the
//! adversarial loop needs: 4D image tensors, (transposed) convolutions, batch
//! normalization, BCE-with-logits losses and Adam. On top of it sit the
//! CelebA data pipeline (`data`), the two networks (`models`) and the
//! training loop (`train`).
//!
//! ```no_run
//! use facegan::{GanConfig, train};
//!
//! let config = GanConfig::load("facegan.toml")?;
//! let losses = train::run(&config)?;
//! println!("recorded {} loss pairs", losses.len());
//! # Ok::<(), facegan::FaceGanError>(())
//! ```

pub mod autograd;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod io;
pub mod models;
pub mod nn;
pub mod ops;
pub mod render;
pub mod tensor;
pub mod train;
pub mod utils;

pub use autograd::{is_grad_enabled, no_grad};
pub use config::GanConfig;
pub use device::{Device, DevicePreference, ExecutionContext};
pub use error::{FaceGanError, Result};
pub use io::{StateDict, TensorData, load_samples, load_state_dict, save_samples, save_state_dict};
pub use models::{Discriminator, Generator, build_network};
pub use nn::Module;
pub use tensor::{RawTensor, Tensor, TensorOps};
pub use train::{LossHistory, LossRecord, Trainer, TrainingEvent};
