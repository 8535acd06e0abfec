use facegan::data::{DataLoader, InMemoryDataset, scale_tensor};
use facegan::io::{diff_state_dict, load_state_dict};
use facegan::train::{FEATURE_RANGE, read_loss_log};
use facegan::*;
use std::path::Path;

fn small_config(dir: &Path) -> GanConfig {
    let mut config = GanConfig::default();
    config.data.batch_size = 4;
    config.model.d_conv_dim = 8;
    config.model.g_conv_dim = 8;
    config.model.z_size = 16;
    config.training.n_epochs = 2;
    config.training.print_every = 2;
    config.training.seed = Some(0);
    config.training.samples_path = dir.join("train_samples.bin");
    config
}

fn trainer(config: &GanConfig) -> Trainer {
    let mut ctx = ExecutionContext::seeded(0);
    let model = &config.model;
    let (d, g) = build_network(model.d_conv_dim, model.g_conv_dim, model.z_size, &mut ctx);
    Trainer::new(config, d, g, ctx).unwrap()
}

fn snapshot(module: &dyn Module) -> Vec<Vec<f32>> {
    module
        .parameters()
        .iter()
        .map(|p| p.borrow().data.clone())
        .collect()
}

#[test]
fn test_one_step_on_zero_images() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.data.batch_size = 32;
    let mut trainer = trainer(&config);

    let real = scale_tensor(&RawTensor::zeros(&[32, 3, 32, 32]), FEATURE_RANGE);
    let d_start = snapshot(trainer.discriminator());
    let g_start = snapshot(trainer.generator());

    let d_loss = trainer.discriminator_step(&real);
    assert!(d_loss.is_finite() && d_loss >= 0.0);
    let d_after_d = snapshot(trainer.discriminator());
    assert_ne!(d_after_d, d_start, "discriminator step must move D");
    assert_eq!(snapshot(trainer.generator()), g_start, "discriminator step must not move G");

    let g_loss = trainer.generator_step(32);
    assert!(g_loss.is_finite() && g_loss >= 0.0);
    assert_eq!(snapshot(trainer.discriminator()), d_after_d, "generator step must not move D");
    assert_ne!(snapshot(trainer.generator()), g_start, "generator step must move G");

    assert_eq!(trainer.d_optimizer().steps(), 1);
    assert_eq!(trainer.g_optimizer().steps(), 1);
}

#[test]
fn test_fit_alternates_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    let log_path = dir.path().join("losses.csv");
    config.training.loss_log_path = Some(log_path.clone());
    config.training.checkpoint_dir = Some(dir.path().join("checkpoints"));
    let mut trainer = trainer(&config);

    // 10 images in batches of 4: 3 batches per epoch, the last one partial
    let dataset = InMemoryDataset::constant(10, [3, 32, 32], 0.0);
    let mut loader = DataLoader::new(dataset, 4, true, 1);

    let mut events = Vec::new();
    let losses = trainer.fit_with(&mut loader, |e| events.push(*e)).unwrap();

    assert_eq!(trainer.d_optimizer().steps(), 6);
    assert_eq!(trainer.g_optimizer().steps(), 6);

    // D then G for every batch, losses at batches 0 and 2, one snapshot per epoch
    let mut expected = Vec::new();
    for epoch in 0..2 {
        for batch in 0..3 {
            expected.push(format!("d{epoch}.{batch}"));
            expected.push(format!("g{epoch}.{batch}"));
            if batch % 2 == 0 {
                expected.push(format!("l{epoch}.{batch}"));
            }
        }
        expected.push(format!("s{epoch}"));
    }
    let observed: Vec<String> = events
        .iter()
        .map(|e| match e {
            TrainingEvent::DiscriminatorStep { epoch, batch, .. } => format!("d{epoch}.{batch}"),
            TrainingEvent::GeneratorStep { epoch, batch, .. } => format!("g{epoch}.{batch}"),
            TrainingEvent::LossRecorded(r) => format!("l{}.{}", r.epoch, r.batch),
            TrainingEvent::EpochSampled { epoch } => format!("s{epoch}"),
        })
        .collect();
    assert_eq!(observed, expected);

    assert_eq!(losses.len(), 4);
    assert!(
        losses
            .records()
            .iter()
            .all(|r| r.d_loss.is_finite() && r.g_loss.is_finite())
    );
    assert_eq!(read_loss_log(&log_path).unwrap(), losses.records());

    let samples = load_samples(&config.training.samples_path).unwrap();
    assert_eq!(samples.len(), 2);
    for snapshot in &samples {
        assert_eq!(snapshot.shape, vec![16, 3, 32, 32]);
        assert!(snapshot.data.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    let saved_g = load_state_dict(dir.path().join("checkpoints/generator.bin")).unwrap();
    assert!(diff_state_dict(&trainer.generator().state_dict(), &saved_g).is_empty());
    let saved_d = load_state_dict(dir.path().join("checkpoints/discriminator.bin")).unwrap();
    assert_eq!(saved_d, trainer.discriminator().state_dict());
}

#[test]
fn test_fixed_latent_batch_is_never_resampled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.training.n_epochs = 1;
    let mut trainer = trainer(&config);
    let fixed = trainer.fixed_z().to_vec();

    let mut loader = DataLoader::new(InMemoryDataset::constant(4, [3, 32, 32], 0.5), 4, false, 0);
    trainer.fit(&mut loader).unwrap();

    assert_eq!(trainer.fixed_z().to_vec(), fixed);
    assert_eq!(trainer.fixed_z().shape(), vec![16, 16]);
    assert!(fixed.iter().all(|v| (-1.0..=1.0).contains(v)));
    assert_eq!(trainer.samples().len(), 1);
}

#[test]
fn test_second_fit_keeps_appending_to_loss_log() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.training.n_epochs = 1;
    let log_path = dir.path().join("losses.csv");
    config.training.loss_log_path = Some(log_path.clone());
    let mut trainer = trainer(&config);

    // 8 images in batches of 4, print_every 2: one record per fit
    let mut loader = DataLoader::new(InMemoryDataset::constant(8, [3, 32, 32], 0.0), 4, false, 0);
    let first = trainer.fit(&mut loader).unwrap();
    assert_eq!(first.len(), 1);

    let second = trainer.fit(&mut loader).unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(trainer.losses().len(), 2);
    assert_eq!(read_loss_log(&log_path).unwrap(), second.records());
}

#[test]
fn test_from_config_validates_before_building() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.data.batch_size = 0;
    let err = Trainer::from_config(&config, ExecutionContext::seeded(0)).unwrap_err();
    assert!(matches!(err, FaceGanError::InvalidConfig(_)), "{err}");

    let config = small_config(dir.path());
    let trainer = Trainer::from_config(&config, ExecutionContext::seeded(0)).unwrap();
    assert_eq!(trainer.generator().z_size(), 16);
}

#[test]
fn test_run_rejects_invalid_config_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("faces");
    std::fs::create_dir(&images).unwrap();
    image::RgbImage::new(32, 32).save(images.join("a.png")).unwrap();

    let mut config = small_config(dir.path());
    config.data.data_dir = images;
    config.data.batch_size = 0;
    let err = train::run(&config).unwrap_err();
    assert!(matches!(err, FaceGanError::InvalidConfig(_)), "{err}");
}
