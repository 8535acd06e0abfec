use crate::nn::Module;
use crate::tensor::Tensor;
use crate::tensor::TensorOps;

/// Squashes generator output into [-1, 1], the range of scaled images
pub struct Tanh;

impl Module for Tanh {
    fn forward(&self, x: &Tensor) -> Tensor {
        x.tanh()
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![] // No learnable params
    }
}
