//! Weight initialization.
//!
//! Every layer picks a reasonable default on construction; `Initialize` lets a
//! network overwrite those defaults with a single scheme before training.

use crate::tensor::{Tensor, sample_normal};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Normal initialization scheme used by DCGAN-style networks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightInit {
    /// Mean of conv, transposed conv and linear weights
    pub mean: f32,
    /// Standard deviation of all weights, including normalization scale
    pub std: f32,
    /// Mean of the normalization scale (gamma)
    pub norm_scale_mean: f32,
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit {
            mean: 0.0,
            std: 0.02,
            norm_scale_mean: 1.0,
        }
    }
}

/// Layers whose parameters can be reset by a `WeightInit` scheme
pub trait Initialize {
    fn initialize<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R);
}

/// Overwrite `t` with N(mean, std²) samples
pub fn fill_normal<R: Rng + ?Sized>(t: &Tensor, mean: f32, std: f32, rng: &mut R) {
    let mut b = t.borrow_mut();
    b.data = sample_normal(b.data.len(), mean, std, rng);
    b.grad = None;
}

pub fn fill_constant(t: &Tensor, value: f32) {
    let mut b = t.borrow_mut();
    b.data.fill(value);
    b.grad = None;
}

/// U(-1/√fan_in, 1/√fan_in), the default for conv and linear weights
pub(crate) fn fan_in_uniform<R: Rng + ?Sized>(size: usize, fan_in: usize, rng: &mut R) -> Vec<f32> {
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound).expect("bound is finite");
    (0..size).map(|_| dist.sample(rng)).collect()
}

/// Xavier/Glorot uniform: U(-a, a) with a = √(6 / (fan_in + fan_out))
pub(crate) fn xavier_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Vec<f32> {
    let bound = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound).expect("bound is finite");
    (0..fan_in * fan_out).map(|_| dist.sample(rng)).collect()
}
