pub mod history;
pub mod trainer;

pub use history::{LossHistory, LossRecord, SampleHistory, read_loss_log};
pub use trainer::{FEATURE_RANGE, Trainer, TrainingEvent};

use crate::config::GanConfig;
use crate::data::{DataLoader, ImageFolder};
use crate::device::ExecutionContext;
use crate::error::Result;

/// Everything `facegan train` does: open the image folder, build and
/// initialize both networks, train, and persist the results
///
/// The config is validated once, by `Trainer::from_config`, before the
/// loader is built.
pub fn run(config: &GanConfig) -> Result<LossHistory> {
    let mut ctx = ExecutionContext::resolve(config.training.device, config.training.seed);

    let dataset = ImageFolder::open(&config.data.data_dir, config.data.image_size)?;
    let shuffle_seed = ctx.derive_seed();
    let mut trainer = Trainer::from_config(config, ctx)?;

    let mut loader = DataLoader::new(dataset, config.data.batch_size, config.data.shuffle, shuffle_seed);
    trainer.fit(&mut loader)
}
