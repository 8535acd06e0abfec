use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// max(x, 0) + negative_slope · min(x, 0)
pub struct LeakyReLU {
    pub negative_slope: f32,
}

impl LeakyReLU {
    pub fn new(negative_slope: f32) -> Self {
        LeakyReLU { negative_slope }
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl Module for LeakyReLU {
    fn forward(&self, x: &Tensor) -> Tensor {
        x.leaky_relu(self.negative_slope)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![] // No learnable params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawTensor;

    #[test]
    fn test_default_slope() {
        let act = LeakyReLU::default();
        let y = act.forward(&RawTensor::new(vec![-1.0, 0.5], &[2], false));
        assert_eq!(y.to_vec(), vec![-0.2, 0.5]);
    }
}
