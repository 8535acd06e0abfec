use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::nn::init::{Initialize, WeightInit, fill_constant, fill_normal, xavier_uniform};
use crate::tensor::{RawTensor, Tensor, TensorOps};
use rand::Rng;

/// Fully-connected (dense/linear) layer
///
/// Computes: y = xW + b
/// where x is (batch, in_features), W is (in_features, out_features), b is (out_features)
pub struct Linear {
    pub weight: Tensor,
    pub bias: Option<Tensor>,
}

impl Module for Linear {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.forward(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weight.clone()];
        if let Some(ref bias) = self.bias {
            params.push(bias.clone())
        }
        params
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("weight".to_string(), TensorData::from_tensor(&self.weight));
        if let Some(ref bias) = self.bias {
            state.insert("bias".to_string(), TensorData::from_tensor(bias));
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        if let Some(td) = state.get("weight") {
            td.copy_into(&self.weight);
        }
        if let (Some(bias), Some(td)) = (&self.bias, state.get("bias")) {
            td.copy_into(bias);
        }
    }
}

impl Linear {
    /// Create a new linear layer
    ///
    /// Weights use Xavier uniform initialization, the bias starts at zero.
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        use_bias: bool,
        rng: &mut R,
    ) -> Self {
        let w = RawTensor::parameter(
            xavier_uniform(in_features, out_features, rng),
            &[in_features, out_features],
        );
        let b = use_bias.then(|| RawTensor::parameter(vec![0.0; out_features], &[out_features]));
        Linear { weight: w, bias: b }
    }

    /// Forward pass through the layer
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let out = x.matmul(&self.weight);
        if let Some(b) = &self.bias {
            out.add(b)
        } else {
            out
        }
    }
}

impl Initialize for Linear {
    fn initialize<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R) {
        fill_normal(&self.weight, init.mean, init.std, rng);
        if let Some(ref b) = self.bias {
            fill_constant(b, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_linear_forward_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Linear::new(4, 3, true, &mut rng);
        let x = RawTensor::randn(&[5, 4], 0.0, 1.0, &mut rng);
        assert_eq!(layer.forward(&x).shape(), vec![5, 3]);
        assert_eq!(layer.num_parameters(), 4 * 3 + 3);
    }

    #[test]
    fn test_linear_gradient() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Linear::new(3, 2, true, &mut rng);
        let x = RawTensor::randn(&[2, 3], 0.0, 1.0, &mut rng);
        x.borrow_mut().requires_grad = true;
        assert!(RawTensor::check_gradients_simple(&x, |t| layer.forward(t).tanh().sum()));
        assert!(RawTensor::check_gradients_simple(&layer.weight, |w| {
            x.matmul(w).tanh().sum()
        }));
    }
}
