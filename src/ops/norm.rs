use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

/// Per-channel mean and (biased) variance
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelStats {
    pub mean: Vec<f32>,
    pub var: Vec<f32>,
}

impl ChannelStats {
    /// Statistics of a (B, C, H, W) buffer over the batch and spatial axes
    pub fn of(data: &[f32], channels: usize, plane: usize) -> Self {
        let n = (data.len() / channels) as f32;
        let mut mean = vec![0.0; channels];
        for (i, chunk) in data.chunks(plane).enumerate() {
            mean[i % channels] += chunk.iter().sum::<f32>();
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; channels];
        for (i, chunk) in data.chunks(plane).enumerate() {
            let m = mean[i % channels];
            var[i % channels] += chunk.iter().map(|v| (v - m) * (v - m)).sum::<f32>();
        }
        var.iter_mut().for_each(|v| *v /= n);
        ChannelStats { mean, var }
    }
}

/// Gradient function for `batch_norm2d`
///
/// With batch statistics, every output depends on every input of its
/// channel:
/// ∂L/∂x = γ·σ⁻¹/n · (n·∂L/∂y − Σ∂L/∂y − x̂·Σ(∂L/∂y·x̂))
///
/// With fixed (running) statistics the normalization is affine and
/// ∂L/∂x = ∂L/∂y·γ·σ⁻¹.
pub struct BatchNormGradFn {
    x_hat: Vec<f32>,
    inv_std: Vec<f32>,
    channels: usize,
    plane: usize,
    batch_stats: bool,
}

impl GradFn for BatchNormGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let x = parents.first().expect("batch_norm2d requires an input").borrow();
        let gamma = parents.get(1).expect("batch_norm2d requires gamma").borrow();
        let beta = parents.get(2).expect("batch_norm2d requires beta").borrow();
        let (channels, plane) = (self.channels, self.plane);
        let dy = &out_grad.data;

        let mut sum_dy = vec![0.0; channels];
        let mut sum_dy_xhat = vec![0.0; channels];
        for (i, (g, xh)) in dy.chunks(plane).zip(self.x_hat.chunks(plane)).enumerate() {
            let c = i % channels;
            sum_dy[c] += g.iter().sum::<f32>();
            sum_dy_xhat[c] += g.iter().zip(xh).map(|(a, b)| a * b).sum::<f32>();
        }

        let grad_x = x.requires_grad.then(|| {
            let n = (dy.len() / channels) as f32;
            let mut dx = vec![0.0; dy.len()];
            for (i, ((dx_chunk, g), xh)) in dx
                .chunks_mut(plane)
                .zip(dy.chunks(plane))
                .zip(self.x_hat.chunks(plane))
                .enumerate()
            {
                let c = i % channels;
                let scale = gamma.data[c] * self.inv_std[c];
                for ((d, &g), &xh) in dx_chunk.iter_mut().zip(g).zip(xh) {
                    *d = if self.batch_stats {
                        scale / n * (n * g - sum_dy[c] - xh * sum_dy_xhat[c])
                    } else {
                        scale * g
                    };
                }
            }
            dx
        });

        vec![
            grad_x,
            gamma.requires_grad.then_some(sum_dy_xhat),
            beta.requires_grad.then_some(sum_dy),
        ]
    }
}

impl RawTensor {
    /// Batch normalization over a (B, C, H, W) tensor: y = γ·(x − μ)/√(σ² + ε) + β
    ///
    /// With `running = None` the statistics come from the batch itself and are
    /// returned so the caller can update its running estimates. Otherwise the
    /// given statistics are used as constants.
    ///
    /// # Panics
    /// Non-4D input, or `gamma`/`beta` that do not have one entry per channel
    pub fn batch_norm2d(
        x_t: &Tensor,
        gamma: &Tensor,
        beta: &Tensor,
        running: Option<&ChannelStats>,
        eps: f32,
    ) -> (Tensor, ChannelStats) {
        let (out, shape, grad_fn, stats) = {
            let x = x_t.borrow();
            assert_eq!(
                x.shape.len(),
                4,
                "BatchNorm2d expected 4D input (B,C,H,W), got {:?}",
                x.shape
            );
            let channels = x.shape[1];
            let plane = x.shape[2] * x.shape[3];
            let g = gamma.borrow();
            let b = beta.borrow();
            assert_eq!(g.data.len(), channels, "Channel mismatch");
            assert_eq!(b.data.len(), channels, "Channel mismatch");

            let stats = match running {
                Some(s) => s.clone(),
                None => ChannelStats::of(&x.data, channels, plane),
            };
            let inv_std: Vec<f32> = stats.var.iter().map(|v| 1.0 / (v + eps).sqrt()).collect();

            let mut x_hat = vec![0.0; x.data.len()];
            let mut out = vec![0.0; x.data.len()];
            for (i, ((xh, o), src)) in x_hat
                .chunks_mut(plane)
                .zip(out.chunks_mut(plane))
                .zip(x.data.chunks(plane))
                .enumerate()
            {
                let c = i % channels;
                for ((xh, o), &v) in xh.iter_mut().zip(o.iter_mut()).zip(src) {
                    *xh = (v - stats.mean[c]) * inv_std[c];
                    *o = g.data[c] * *xh + b.data[c];
                }
            }

            let grad_fn = BatchNormGradFn {
                x_hat,
                inv_std,
                channels,
                plane,
                batch_stats: running.is_none(),
            };
            (out, x.shape.clone(), grad_fn, stats)
        };

        let out = Self::from_op(
            out,
            &shape,
            vec![x_t.clone(), gamma.clone(), beta.clone()],
            Box::new(grad_fn),
        );
        (out, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorOps;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn affine(channels: usize, rng: &mut StdRng) -> (Tensor, Tensor) {
        let gamma = RawTensor::randn(&[channels], 1.0, 0.2, rng);
        let beta = RawTensor::randn(&[channels], 0.0, 0.2, rng);
        gamma.borrow_mut().requires_grad = true;
        beta.borrow_mut().requires_grad = true;
        (gamma, beta)
    }

    #[test]
    fn test_batch_stats_normalize_each_channel() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = RawTensor::randn(&[4, 2, 3, 3], 3.0, 2.0, &mut rng);
        let gamma = RawTensor::ones(&[2]);
        let beta = RawTensor::zeros(&[2]);
        let (y, _) = RawTensor::batch_norm2d(&x, &gamma, &beta, None, 1e-5);
        let stats = ChannelStats::of(&y.to_vec(), 2, 9);
        for c in 0..2 {
            assert!(stats.mean[c].abs() < 1e-4);
            assert!((stats.var[c] - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_batch_norm_gradients_with_batch_stats() {
        let mut rng = StdRng::seed_from_u64(1);
        let x = RawTensor::randn(&[3, 2, 2, 2], 0.0, 1.0, &mut rng);
        x.borrow_mut().requires_grad = true;
        let (gamma, beta) = affine(2, &mut rng);
        // a non-uniform downstream weighting so Σ∂L/∂y terms do not vanish
        let mix = RawTensor::randn(&[3, 2, 2, 2], 0.0, 1.0, &mut rng);

        let loss = |x: &Tensor, g: &Tensor, b: &Tensor| {
            RawTensor::batch_norm2d(x, g, b, None, 1e-5).0.tanh().elem_mul(&mix).sum()
        };
        assert!(RawTensor::check_gradients_simple(&x, |t| loss(t, &gamma, &beta)));
        assert!(RawTensor::check_gradients_simple(&gamma, |t| loss(&x, t, &beta)));
        assert!(RawTensor::check_gradients_simple(&beta, |t| loss(&x, &gamma, t)));
    }

    #[test]
    fn test_batch_norm_gradients_with_running_stats() {
        let mut rng = StdRng::seed_from_u64(2);
        let x = RawTensor::randn(&[2, 2, 2, 2], 0.0, 1.0, &mut rng);
        x.borrow_mut().requires_grad = true;
        let (gamma, beta) = affine(2, &mut rng);
        let running = ChannelStats {
            mean: vec![0.1, -0.2],
            var: vec![0.8, 1.5],
        };
        assert!(RawTensor::check_gradients_simple(&x, |t| {
            RawTensor::batch_norm2d(t, &gamma, &beta, Some(&running), 1e-5)
                .0
                .tanh()
                .sum()
        }));
    }
}
