//! Binary cross-entropy losses for the adversarial game.
//!
//! Networks emit raw logits; the sigmoid is folded into the loss so that
//! large logits never overflow.

use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

/// Gradient function for `bce_with_logits_loss`: ∂L/∂x = (σ(x) − y) / N
pub struct BceWithLogitsGradFn {
    targets: Vec<f32>,
}

impl GradFn for BceWithLogitsGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let x = parents.first().expect("bce requires logits").borrow();
        let scale = out_grad.data[0] / x.data.len() as f32;
        let grad = x
            .data
            .iter()
            .zip(&self.targets)
            .map(|(&x, &y)| (sigmoid(x) - y) * scale)
            .collect();
        vec![Some(grad)]
    }
}

fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl RawTensor {
    /// mean(max(x, 0) − x·y + ln(1 + e^(−|x|)))
    ///
    /// # Panics
    /// If `targets` does not have one entry per logit
    pub fn bce_with_logits_loss(logits: &Tensor, targets: &[f32]) -> Tensor {
        let value = {
            let x = logits.borrow();
            assert_eq!(
                x.data.len(),
                targets.len(),
                "BCE target count does not match logits {:?}",
                x.shape
            );
            let total: f32 = x
                .data
                .iter()
                .zip(targets)
                .map(|(&x, &y)| x.max(0.0) - x * y + (-x.abs()).exp().ln_1p())
                .sum();
            total / targets.len() as f32
        };
        Self::from_op(
            vec![value],
            &[1],
            vec![logits.clone()],
            Box::new(BceWithLogitsGradFn {
                targets: targets.to_vec(),
            }),
        )
    }
}

pub fn bce_with_logits_loss(logits: &Tensor, targets: &[f32]) -> Tensor {
    RawTensor::bce_with_logits_loss(logits, targets)
}

/// BCE against all-ones targets: how far `d_out` is from "real"
pub fn real_loss(d_out: &Tensor) -> Tensor {
    let n = d_out.borrow().data.len();
    bce_with_logits_loss(d_out, &vec![1.0; n])
}

/// BCE against all-zeros targets: how far `d_out` is from "fake"
pub fn fake_loss(d_out: &Tensor) -> Tensor {
    let n = d_out.borrow().data.len();
    bce_with_logits_loss(d_out, &vec![0.0; n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorOps;
    use approx::assert_relative_eq;

    fn logits(values: &[f32]) -> Tensor {
        RawTensor::new(values.to_vec(), &[values.len(), 1], true)
    }

    #[test]
    fn test_zero_logit_costs_ln2() {
        let out = logits(&[0.0, 0.0]);
        assert_relative_eq!(real_loss(&out).item(), std::f32::consts::LN_2, epsilon = 1e-6);
        assert_relative_eq!(fake_loss(&out).item(), std::f32::consts::LN_2, epsilon = 1e-6);
    }

    #[test]
    fn test_losses_non_negative_and_monotone() {
        let mut prev_real = f32::INFINITY;
        let mut prev_fake = 0.0;
        for x in [-30.0, -5.0, -1.0, 0.0, 1.0, 5.0, 30.0] {
            let out = logits(&[x]);
            let real = real_loss(&out).item();
            let fake = fake_loss(&out).item();
            assert!(real >= 0.0 && fake >= 0.0);
            assert!(real.is_finite() && fake.is_finite());
            // real_loss falls as x grows, fake_loss rises
            assert!(real <= prev_real);
            assert!(fake >= prev_fake);
            prev_real = real;
            prev_fake = fake;
        }
    }

    #[test]
    fn test_bce_matches_naive_formula() {
        let xs = [-2.0f32, -0.3, 0.7, 3.0];
        let ys = [1.0f32, 0.0, 1.0, 0.0];
        let expected: f32 = xs
            .iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let p = 1.0 / (1.0 + (-x).exp());
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f32>()
            / 4.0;
        let loss = bce_with_logits_loss(&logits(&xs), &ys).item();
        assert_relative_eq!(loss, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_bce_gradient() {
        let x = logits(&[-1.5, 0.2, 2.5, -0.1]);
        let targets = [1.0, 0.0, 1.0, 0.0];
        assert!(RawTensor::check_gradients_simple(&x, |t| {
            bce_with_logits_loss(t, &targets)
        }));
    }

    #[test]
    fn test_real_loss_gradient_pushes_logits_up() {
        let x = logits(&[0.0, -2.0]);
        real_loss(&x).backward();
        let grad = x.grad().expect("logits require grad");
        assert!(grad.iter().all(|g| *g < 0.0));
    }
}
