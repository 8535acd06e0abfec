use facegan::nn::{fake_loss, real_loss};
use facegan::*;

#[test]
fn test_reference_parameter_counts() {
    let mut ctx = ExecutionContext::seeded(0);
    let (d, g) = build_network(32, 32, 100, &mut ctx);
    // conv1 + conv2 + bn2 + conv3 + bn3 + fc
    assert_eq!(d.num_parameters(), 1536 + 32768 + 128 + 131072 + 256 + 2049);
    // fc + deconv1 + bn1 + deconv2 + bn2 + deconv3
    assert_eq!(g.num_parameters(), 206848 + 131072 + 128 + 32768 + 64 + 1536);
}

#[test]
fn test_generator_feeds_discriminator() {
    let mut ctx = ExecutionContext::seeded(1);
    let (d, g) = build_network(8, 8, 20, &mut ctx);
    for batch in [1, 2, 5] {
        let z = RawTensor::uniform(&[batch, 20], -1.0, 1.0, ctx.rng());
        let images = g.forward(&z);
        assert_eq!(images.shape(), vec![batch, 3, 32, 32]);
        assert!(images.to_vec().iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(d.forward(&images).shape(), vec![batch, 1]);
    }
}

#[test]
fn test_eval_mode_is_deterministic_per_input() {
    let mut ctx = ExecutionContext::seeded(2);
    let (_, mut g) = build_network(4, 4, 8, &mut ctx);
    let z = RawTensor::uniform(&[3, 8], -1.0, 1.0, ctx.rng());
    g.eval();
    let first = no_grad(|| g.forward(&z)).to_vec();
    let single = no_grad(|| g.forward(&RawTensor::new(z.to_vec()[..8].to_vec(), &[1, 8], false)));
    // without batch statistics, an image does not depend on the rest of the batch
    for (a, b) in first[..3 * 32 * 32].iter().zip(single.to_vec()) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn test_losses_on_discriminator_output() {
    let mut ctx = ExecutionContext::seeded(3);
    let (d, _) = build_network(4, 4, 8, &mut ctx);
    let images = RawTensor::uniform(&[4, 3, 32, 32], -1.0, 1.0, ctx.rng());
    let logits = d.forward(&images);
    let real = real_loss(&logits).item();
    let fake = fake_loss(&logits).item();
    assert!(real >= 0.0 && fake >= 0.0);
    // freshly initialized logits sit near 0, so both losses are near ln 2
    assert!((real - std::f32::consts::LN_2).abs() < 0.2);
    assert!((fake - std::f32::consts::LN_2).abs() < 0.2);
}
