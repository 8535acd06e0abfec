use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::nn::init::{Initialize, WeightInit, fan_in_uniform, fill_constant, fill_normal};
use crate::ops::ConvGeometry;
use crate::tensor::{RawTensor, Tensor};
use rand::Rng;

/// Transposed 2D convolution, the upsampling counterpart of `Conv2d`
///
/// Output size per spatial axis: `(H - 1)·stride + kernel - 2·padding`,
/// so k4 s2 p1 doubles the resolution.
pub struct ConvTranspose2d {
    pub weight: Tensor,       // [in_channels, out_channels, kernel, kernel]
    pub bias: Option<Tensor>, // [out_channels]
    geometry: ConvGeometry,
}

impl ConvTranspose2d {
    pub fn new<R: Rng + ?Sized>(
        in_ch: usize,
        out_ch: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        use_bias: bool,
        rng: &mut R,
    ) -> Self {
        let fan_in = out_ch * kernel * kernel;
        let w = RawTensor::parameter(
            fan_in_uniform(in_ch * fan_in, fan_in, rng),
            &[in_ch, out_ch, kernel, kernel],
        );
        let b = use_bias.then(|| RawTensor::parameter(fan_in_uniform(out_ch, fan_in, rng), &[out_ch]));
        ConvTranspose2d {
            weight: w,
            bias: b,
            geometry: ConvGeometry::new(kernel, stride, padding),
        }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        RawTensor::conv_transpose2d(x, &self.weight, self.bias.as_ref(), self.geometry)
    }
}

impl Module for ConvTranspose2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.forward(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut p = vec![self.weight.clone()];
        if let Some(ref b) = self.bias {
            p.push(b.clone());
        }
        p
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("weight".to_string(), TensorData::from_tensor(&self.weight));
        if let Some(ref b) = self.bias {
            state.insert("bias".to_string(), TensorData::from_tensor(b));
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        if let Some(td) = state.get("weight") {
            td.copy_into(&self.weight);
        }
        if let (Some(b), Some(td)) = (&self.bias, state.get("bias")) {
            td.copy_into(b);
        }
    }
}

impl Initialize for ConvTranspose2d {
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
    use crate::tensor::TensorOps;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_deconv_doubles_resolution() {
        let mut rng = StdRng::seed_from_u64(0);
        let deconv = ConvTranspose2d::new(8, 4, 4, 2, 1, false, &mut rng);
        let x = RawTensor::randn(&[3, 8, 4, 4], 0.0, 1.0, &mut rng);
        assert_eq!(deconv.forward(&x).shape(), vec![3, 4, 8, 8]);
    }

    #[test]
    fn test_deconv_bias_gradient() {
        let mut rng = StdRng::seed_from_u64(1);
        let deconv = ConvTranspose2d::new(2, 3, 4, 2, 1, true, &mut rng);
        let x = RawTensor::randn(&[2, 2, 2, 2], 0.0, 1.0, &mut rng);
        let bias = deconv.bias.clone().expect("bias requested");
        let w = deconv.weight.clone();
        assert!(RawTensor::check_gradients_simple(&bias, |b| {
            RawTensor::conv_transpose2d(&x, &w, Some(b), deconv.geometry)
                .tanh()
                .sum()
        }));
    }
}
