use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::nn::init::{Initialize, WeightInit, fill_constant, fill_normal};
use crate::ops::ChannelStats;
use crate::tensor::{RawTensor, Tensor};
use rand::Rng;
use std::cell::RefCell;

pub struct BatchNorm2d {
    num_features: usize,
    eps: f32,
    momentum: f32,
    training: bool,
    // Parameters (Learnable)
    pub gamma: Tensor,
    pub beta: Tensor,
    // Buffers (Non-learnable), updated during `forward(&self)` in training mode
    running: RefCell<ChannelStats>,
}

impl BatchNorm2d {
    pub fn new(num_features: usize) -> Self {
        Self::new_with_params(num_features, 1e-5, 0.1)
    }

    pub fn new_with_params(num_features: usize, eps: f32, momentum: f32) -> Self {
        BatchNorm2d {
            num_features,
            eps,
            momentum,
            training: true,
            gamma: RawTensor::parameter(vec![1.0; num_features], &[num_features]),
            beta: RawTensor::parameter(vec![0.0; num_features], &[num_features]),
            running: RefCell::new(ChannelStats {
                mean: vec![0.0; num_features],
                var: vec![1.0; num_features],
            }),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn running_stats(&self) -> ChannelStats {
        self.running.borrow().clone()
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let channels = x.borrow().shape.get(1).copied();
        assert_eq!(channels, Some(self.num_features), "Channel mismatch");

        if !self.training {
            let running = self.running.borrow();
            return RawTensor::batch_norm2d(x, &self.gamma, &self.beta, Some(&*running), self.eps).0;
        }

        let (out, batch) = RawTensor::batch_norm2d(x, &self.gamma, &self.beta, None, self.eps);

        // running_var tracks the unbiased estimate, the batch itself is
        // normalized with the biased one
        let n = {
            let s = x.borrow();
            (s.shape[0] * s.shape[2] * s.shape[3]) as f32
        };
        let bessel = if n > 1.0 { n / (n - 1.0) } else { 1.0 };
        let m = self.momentum;
        let mut running = self.running.borrow_mut();
        for c in 0..self.num_features {
            running.mean[c] = (1.0 - m) * running.mean[c] + m * batch.mean[c];
            running.var[c] = (1.0 - m) * running.var[c] + m * batch.var[c] * bessel;
        }
        out
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    fn train(&mut self, mode: bool) {
        self.training = mode;
    }

    fn state_dict(&self) -> StateDict {
        let running = self.running.borrow();
        let buffer = |data: &[f32]| TensorData {
            data: data.to_vec(),
            shape: vec![self.num_features],
        };
        let mut state = StateDict::new();
        state.insert("gamma".to_string(), TensorData::from_tensor(&self.gamma));
        state.insert("beta".to_string(), TensorData::from_tensor(&self.beta));
        state.insert("running_mean".to_string(), buffer(&running.mean));
        state.insert("running_var".to_string(), buffer(&running.var));
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        for (key, td) in state {
            match key.as_str() {
                "gamma" => td.copy_into(&self.gamma),
                "beta" => td.copy_into(&self.beta),
                "running_mean" => self.running.get_mut().mean = td.data.clone(),
                "running_var" => self.running.get_mut().var = td.data.clone(),
                _ => {}
            }
        }
    }
}

impl Initialize for BatchNorm2d {
    fn initialize<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R) {
        fill_normal(&self.gamma, init.norm_scale_mean, init.std, rng);
        fill_constant(&self.beta, 0.0);
    }
}
