use crate::autograd::no_grad;
use crate::config::GanConfig;
use crate::data::{DataLoader, Dataset, scale_tensor};
use crate::device::ExecutionContext;
use crate::error::Result;
use crate::io::save_state_dict;
use crate::models::{Discriminator, Generator, build_network};
use crate::nn::{Adam, Module, fake_loss, real_loss};
use crate::tensor::{RawTensor, Tensor, TensorOps};
use crate::train::history::{LossHistory, LossRecord, SampleHistory};
use crate::utils::ProgressBar;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Range real images are scaled to, matching the generator's tanh output
pub const FEATURE_RANGE: (f32, f32) = (-1.0, 1.0);

/// Progress notifications from `Trainer::fit_with`, in the order they happen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingEvent {
    DiscriminatorStep { epoch: usize, batch: usize, d_loss: f32 },
    GeneratorStep { epoch: usize, batch: usize, g_loss: f32 },
    LossRecorded(LossRecord),
    /// The fixed latent batch was rendered at the end of `epoch`
    EpochSampled { epoch: usize },
}

/// Adversarial training of a discriminator/generator pair
///
/// Every batch runs one discriminator update followed by one generator
/// update through the freshly updated discriminator.
pub struct Trainer {
    d: Discriminator,
    g: Generator,
    d_optimizer: Adam,
    g_optimizer: Adam,
    ctx: ExecutionContext,
    /// Sampled once, reused for every epoch's snapshot
    fixed_z: Tensor,
    n_epochs: usize,
    print_every: usize,
    progress: bool,
    samples_path: PathBuf,
    checkpoint_dir: Option<PathBuf>,
    losses: LossHistory,
    samples: SampleHistory,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("n_epochs", &self.n_epochs)
            .field("print_every", &self.print_every)
            .field("progress", &self.progress)
            .field("samples_path", &self.samples_path)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .finish_non_exhaustive()
    }
}

impl Trainer {
    /// Validate `config`, then build and initialize both networks from it
    pub fn from_config(config: &GanConfig, mut ctx: ExecutionContext) -> Result<Self> {
        config.validate()?;
        let model = &config.model;
        let (d, g) = build_network(model.d_conv_dim, model.g_conv_dim, model.z_size, &mut ctx);
        Self::assemble(config, d, g, ctx)
    }

    /// Validate `config` and train the given networks
    pub fn new(config: &GanConfig, d: Discriminator, g: Generator, ctx: ExecutionContext) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, d, g, ctx)
    }

    /// Optimizers, fixed latent batch and loss log for an already validated config
    fn assemble(
        config: &GanConfig,
        d: Discriminator,
        g: Generator,
        mut ctx: ExecutionContext,
    ) -> Result<Self> {
        let optim = &config.optim;
        let betas = (optim.beta1, optim.beta2);
        let d_optimizer = Adam::new(d.parameters(), optim.lr, betas, optim.eps, optim.weight_decay);
        let g_optimizer = Adam::new(g.parameters(), optim.lr, betas, optim.eps, optim.weight_decay);

        let training = &config.training;
        let fixed_z = RawTensor::uniform(&[training.sample_size, g.z_size()], -1.0, 1.0, ctx.rng());
        let losses = match &training.loss_log_path {
            Some(path) => LossHistory::with_csv_log(path)?,
            None => LossHistory::new(),
        };

        Ok(Trainer {
            d,
            g,
            d_optimizer,
            g_optimizer,
            ctx,
            fixed_z,
            n_epochs: training.n_epochs,
            print_every: training.print_every,
            progress: training.progress,
            samples_path: training.samples_path.clone(),
            checkpoint_dir: training.checkpoint_dir.clone(),
            losses,
            samples: SampleHistory::new(),
        })
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.d
    }

    pub fn generator(&self) -> &Generator {
        &self.g
    }

    pub fn d_optimizer(&self) -> &Adam {
        &self.d_optimizer
    }

    pub fn g_optimizer(&self) -> &Adam {
        &self.g_optimizer
    }

    pub fn fixed_z(&self) -> &Tensor {
        &self.fixed_z
    }

    pub fn samples(&self) -> &SampleHistory {
        &self.samples
    }

    pub fn losses(&self) -> &LossHistory {
        &self.losses
    }

    /// (B, z_size) latent batch, uniform on [-1, 1]
    fn sample_latent(&mut self, batch: usize) -> Tensor {
        RawTensor::uniform(&[batch, self.g.z_size()], -1.0, 1.0, self.ctx.rng())
    }

    /// One discriminator update on a batch of real images scaled to [-1, 1]
    ///
    /// The fake half of the batch comes from the current generator with no
    /// graph attached, so generator parameters receive no gradient here.
    pub fn discriminator_step(&mut self, real: &Tensor) -> f32 {
        let batch = real.borrow().shape[0];
        self.d_optimizer.zero_grad();

        let d_real_loss = real_loss(&self.d.forward(real));

        let z = self.sample_latent(batch);
        let fake = no_grad(|| self.g.forward(&z));
        let d_fake_loss = fake_loss(&self.d.forward(&fake));

        let d_loss = d_real_loss.add(&d_fake_loss);
        d_loss.backward();
        self.d_optimizer.step();
        d_loss.item()
    }

    /// One generator update: make `batch` fresh fakes and push the
    /// discriminator's verdict on them towards "real"
    pub fn generator_step(&mut self, batch: usize) -> f32 {
        self.g_optimizer.zero_grad();

        let z = self.sample_latent(batch);
        let fake = self.g.forward(&z);
        let g_loss = real_loss(&self.d.forward(&fake));

        g_loss.backward();
        self.g_optimizer.step();
        g_loss.item()
    }

    /// Generator output on the fixed latent batch, in eval mode
    pub fn sample_fixed(&mut self) -> Tensor {
        self.g.eval();
        let images = no_grad(|| self.g.forward(&self.fixed_z));
        self.g.train(true);
        images
    }

    /// Train for the configured number of epochs without observing progress
    pub fn fit<D: Dataset>(&mut self, loader: &mut DataLoader<D>) -> Result<LossHistory> {
        self.fit_with(loader, |_| {})
    }

    /// Train for the configured number of epochs, then write the sample
    /// history (and checkpoints, when configured) and return the losses
    ///
    /// Records accumulate across calls. The returned history holds every
    /// record so far; the trainer keeps the CSV log open for the next call.
    pub fn fit_with<D, F>(&mut self, loader: &mut DataLoader<D>, mut observer: F) -> Result<LossHistory>
    where
        D: Dataset,
        F: FnMut(&TrainingEvent),
    {
        let n_epochs = self.n_epochs;
        info!(
            epochs = n_epochs,
            batches_per_epoch = loader.num_batches(),
            batch_size = loader.batch_size(),
            "starting training"
        );

        for epoch in 0..n_epochs {
            let mut bar = self
                .progress
                .then(|| ProgressBar::new(loader.num_batches(), &format!("Epoch {}/{n_epochs}", epoch + 1)));

            for (batch_i, batch) in loader.epoch().enumerate() {
                let batch = batch?;
                let batch_size = batch.len();
                let real = scale_tensor(&batch.images, FEATURE_RANGE);

                let d_loss = self.discriminator_step(&real);
                observer(&TrainingEvent::DiscriminatorStep {
                    epoch,
                    batch: batch_i,
                    d_loss,
                });

                let g_loss = self.generator_step(batch_size);
                observer(&TrainingEvent::GeneratorStep {
                    epoch,
                    batch: batch_i,
                    g_loss,
                });

                if batch_i % self.print_every == 0 {
                    let record = LossRecord {
                        epoch,
                        batch: batch_i,
                        d_loss,
                        g_loss,
                    };
                    self.losses.push(record)?;
                    observer(&TrainingEvent::LossRecorded(record));
                    info!(
                        "Epoch [{:5}/{:5}] | d_loss: {d_loss:6.4} | g_loss: {g_loss:6.4}",
                        epoch + 1,
                        n_epochs
                    );
                    if let Some(bar) = bar.as_mut() {
                        bar.set_suffix(format!("d_loss: {d_loss:.4} | g_loss: {g_loss:.4}"));
                    }
                }
                if let Some(bar) = bar.as_mut() {
                    bar.inc();
                }
            }
            if let Some(bar) = bar {
                bar.finish();
            }

            let images = self.sample_fixed();
            self.samples.push(&images);
            debug!(epoch, "sampled fixed latent batch");
            observer(&TrainingEvent::EpochSampled { epoch });
        }

        self.samples.save(&self.samples_path)?;
        self.save_checkpoints()?;
        Ok(self.losses.snapshot())
    }

    /// Write both state dicts to `checkpoint_dir`, if one is configured
    pub fn save_checkpoints(&self) -> Result<()> {
        let Some(dir) = &self.checkpoint_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;
        save_state_dict(&self.d.state_dict(), dir.join("discriminator.bin"))?;
        save_state_dict(&self.g.state_dict(), dir.join("generator.bin"))?;
        info!(dir = %dir.display(), "saved checkpoints");
        Ok(())
    }
}
