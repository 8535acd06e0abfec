use facegan::io::{diff_state_dict, load_state_dict_checked};
use facegan::*;

#[test]
fn test_checkpoint_restores_generator_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generator.bin");

    let mut ctx = ExecutionContext::seeded(0);
    let (_, mut g) = build_network(4, 4, 8, &mut ctx);
    let z = RawTensor::uniform(&[2, 8], -1.0, 1.0, ctx.rng());
    // move the running statistics away from their defaults
    g.forward(&z);
    g.eval();
    let expected = no_grad(|| g.forward(&z)).to_vec();
    save_state_dict(&g.state_dict(), &path).unwrap();

    let mut other_ctx = ExecutionContext::seeded(99);
    let (_, mut restored) = build_network(4, 4, 8, &mut other_ctx);
    let diff = load_state_dict_checked(&mut restored, &load_state_dict(&path).unwrap());
    assert!(diff.is_empty(), "{diff:?}");
    restored.eval();
    assert_eq!(no_grad(|| restored.forward(&z)).to_vec(), expected);
}

#[test]
fn test_checkpoint_for_other_width_is_reported() {
    let mut ctx = ExecutionContext::seeded(1);
    let (narrow, _) = build_network(4, 4, 8, &mut ctx);
    let (mut wide, _) = build_network(8, 4, 8, &mut ctx);
    let before = wide.state_dict();

    let diff = load_state_dict_checked(&mut wide, &narrow.state_dict());
    assert!(diff.missing_keys.is_empty());
    assert!(diff.shape_mismatches.iter().any(|(k, _, _)| k == "conv1.weight"));
    // mismatched entries are skipped, so nothing changed
    assert!(diff_state_dict(&before, &wide.state_dict()).is_empty());
    assert_eq!(before, wide.state_dict());
}

#[test]
fn test_sample_history_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train_samples.bin");
    let mut ctx = ExecutionContext::seeded(2);
    let samples: Vec<TensorData> = (0..3)
        .map(|_| TensorData::from_tensor(&RawTensor::uniform(&[16, 3, 32, 32], -1.0, 1.0, ctx.rng())))
        .collect();

    save_samples(&samples, &path).unwrap();
    assert_eq!(load_samples(&path).unwrap(), samples);
}

#[test]
fn test_corrupt_sample_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.bin");
    std::fs::write(&path, [0xff, 0xff, 0xff]).unwrap();
    assert!(matches!(load_samples(&path), Err(FaceGanError::Decode(_))));
    assert!(matches!(
        load_samples(dir.path().join("missing.bin")),
        Err(FaceGanError::Io(_))
    ));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("facegan.toml");
    let mut config = GanConfig::default();
    config.training.n_epochs = 5;
    config.training.seed = Some(11);
    config.save(&path).unwrap();
    assert_eq!(GanConfig::load(&path).unwrap(), config);
}
