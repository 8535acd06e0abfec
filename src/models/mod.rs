pub mod discriminator;
pub mod generator;

pub use discriminator::Discriminator;
pub use generator::Generator;

use crate::device::ExecutionContext;
use crate::nn::{Module, WeightInit};
use tracing::info;

/// Build both networks and apply the DCGAN weight initialization
pub fn build_network(
    d_conv_dim: usize,
    g_conv_dim: usize,
    z_size: usize,
    ctx: &mut ExecutionContext,
) -> (Discriminator, Generator) {
    let init = WeightInit::default();
    let rng = ctx.rng();

    let d = Discriminator::new(d_conv_dim, rng);
    let g = Generator::new(z_size, g_conv_dim, rng);
    d.init_weights(&init, rng);
    g.init_weights(&init, rng);

    info!(parameters = d.num_parameters(), "built discriminator\n{d}");
    info!(parameters = g.num_parameters(), "built generator\n{g}");
    (d, g)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_std(values: &[f32]) -> (f32, f32) {
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_dcgan_initialization_statistics() {
        let mut ctx = ExecutionContext::seeded(0);
        let (d, g) = build_network(32, 32, 100, &mut ctx);

        let mut gammas = Vec::new();
        let mut weights_checked = 0;
        for (key, td) in d.state_dict().into_iter().chain(g.state_dict()) {
            if key.ends_with("running_mean") || key.ends_with("running_var") {
                continue;
            } else if key.ends_with("bias") || key.ends_with("beta") {
                assert!(td.data.iter().all(|v| *v == 0.0), "{key} is not zero");
            } else if key.ends_with("gamma") {
                gammas.extend_from_slice(&td.data);
            } else {
                assert!(key.ends_with("weight"), "unexpected key {key}");
                let (mean, std) = mean_std(&td.data);
                assert!(mean.abs() < 0.005, "{key} mean {mean}");
                assert!((std - 0.02).abs() < 0.003, "{key} std {std}");
                weights_checked += 1;
            }
        }
        // conv1..3 + fc in D, fc + deconv1..3 in G
        assert_eq!(weights_checked, 8);

        // bn2/bn3 in D, bn1/bn2 in G
        assert_eq!(gammas.len(), 64 + 128 + 64 + 32);
        let (mean, std) = mean_std(&gammas);
        assert!((mean - 1.0).abs() < 0.01, "gamma mean {mean}");
        assert!((std - 0.02).abs() < 0.005, "gamma std {std}");
    }
}
