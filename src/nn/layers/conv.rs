use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::nn::init::{Initialize, WeightInit, fan_in_uniform, fill_constant, fill_normal};
use crate::ops::ConvGeometry;
use crate::tensor::{RawTensor, Tensor};
use rand::Rng;

/// 2D convolution over (B, C, H, W) inputs with a square kernel
pub struct Conv2d {
    pub weight: Tensor,       // [out_channels, in_channels, kernel, kernel]
    pub bias: Option<Tensor>, // [out_channels]
    geometry: ConvGeometry,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_ch: usize,
        out_ch: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        use_bias: bool,
        rng: &mut R,
    ) -> Self {
        let fan_in = in_ch * kernel * kernel;
        let w = RawTensor::parameter(
            fan_in_uniform(out_ch * fan_in, fan_in, rng),
            &[out_ch, in_ch, kernel, kernel],
        );
        let b = use_bias.then(|| RawTensor::parameter(fan_in_uniform(out_ch, fan_in, rng), &[out_ch]));
        Conv2d {
            weight: w,
            bias: b,
            geometry: ConvGeometry::new(kernel, stride, padding),
        }
    }

    pub fn geometry(&self) -> ConvGeometry {
        self.geometry
    }

    pub fn out_channels(&self) -> usize {
        self.weight.borrow().shape[0]
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        RawTensor::conv2d(x, &self.weight, self.bias.as_ref(), self.geometry)
    }
}

impl Module for Conv2d {
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

impl Initialize for Conv2d {
    fn initialize<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R) {
        fill_normal(&self.weight, init.mean, init.std, rng);
        if let Some(ref b) = self.bias {
            fill_constant(b, 0.0);
        }
    }
}
