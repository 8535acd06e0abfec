use crate::io::{StateDict, insert_prefixed, sub_state};
use crate::nn::{BatchNorm2d, Conv2d, Flatten, Initialize, LeakyReLU, Linear, Module, WeightInit};
use crate::tensor::Tensor;
use rand::Rng;
use std::fmt;

/// Convolutional classifier of 32×32 RGB images, real vs. generated
///
/// Three stride-2 convolutions halve the resolution 32 → 16 → 8 → 4 while
/// the depth grows d → 2d → 4d; a single linear unit produces the logit.
pub struct Discriminator {
    conv_dim: usize,
    conv1: Conv2d,
    conv2: Conv2d,
    bn2: BatchNorm2d,
    conv3: Conv2d,
    bn3: BatchNorm2d,
    act: LeakyReLU,
    flatten: Flatten,
    fc: Linear,
}

impl Discriminator {
    pub fn new<R: Rng + ?Sized>(conv_dim: usize, rng: &mut R) -> Self {
        let d = conv_dim;
        Discriminator {
            conv_dim,
            // no batch norm on the input layer
            conv1: Conv2d::new(3, d, 4, 2, 1, false, rng),
            conv2: Conv2d::new(d, 2 * d, 4, 2, 1, false, rng),
            bn2: BatchNorm2d::new(2 * d),
            conv3: Conv2d::new(2 * d, 4 * d, 4, 2, 1, false, rng),
            bn3: BatchNorm2d::new(4 * d),
            act: LeakyReLU::new(0.2),
            flatten: Flatten::new(),
            fc: Linear::new(4 * d * 4 * 4, 1, true, rng),
        }
    }

    pub fn conv_dim(&self) -> usize {
        self.conv_dim
    }

    /// Reset every weight with `init`: conv and linear weights ~ N(mean, std),
    /// batch-norm scale ~ N(norm_scale_mean, std), biases 0
    pub fn init_weights<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R) {
        self.conv1.initialize(init, rng);
        self.conv2.initialize(init, rng);
        self.bn2.initialize(init, rng);
        self.conv3.initialize(init, rng);
        self.bn3.initialize(init, rng);
        self.fc.initialize(init, rng);
    }
}

impl Module for Discriminator {
    /// (B, 3, 32, 32) images in [-1, 1] -> (B, 1) logits
    fn forward(&self, x: &Tensor) -> Tensor {
        let x = self.act.forward(&self.conv1.forward(x));
        let x = self.act.forward(&self.bn2.forward(&self.conv2.forward(&x)));
        let x = self.act.forward(&self.bn3.forward(&self.conv3.forward(&x)));
        self.fc.forward(&self.flatten.forward(&x))
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.conv1.parameters();
        params.extend(self.conv2.parameters());
        params.extend(self.bn2.parameters());
        params.extend(self.conv3.parameters());
        params.extend(self.bn3.parameters());
        params.extend(self.fc.parameters());
        params
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        insert_prefixed(&mut state, "conv1", self.conv1.state_dict());
        insert_prefixed(&mut state, "conv2", self.conv2.state_dict());
        insert_prefixed(&mut state, "bn2", self.bn2.state_dict());
        insert_prefixed(&mut state, "conv3", self.conv3.state_dict());
        insert_prefixed(&mut state, "bn3", self.bn3.state_dict());
        insert_prefixed(&mut state, "fc", self.fc.state_dict());
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        self.conv1.load_state_dict(&sub_state(state, "conv1"));
        self.conv2.load_state_dict(&sub_state(state, "conv2"));
        self.bn2.load_state_dict(&sub_state(state, "bn2"));
        self.conv3.load_state_dict(&sub_state(state, "conv3"));
        self.bn3.load_state_dict(&sub_state(state, "bn3"));
        self.fc.load_state_dict(&sub_state(state, "fc"));
    }

    fn train(&mut self, mode: bool) {
        self.bn2.train(mode);
        self.bn3.train(mode);
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.conv_dim;
        writeln!(f, "Discriminator(")?;
        writeln!(f, "  (conv1): Conv2d(3, {d}, k=4, s=2, p=1) + LeakyReLU(0.2)")?;
        writeln!(f, "  (conv2): Conv2d({d}, {}, k=4, s=2, p=1) + BatchNorm2d + LeakyReLU(0.2)", 2 * d)?;
        writeln!(f, "  (conv3): Conv2d({}, {}, k=4, s=2, p=1) + BatchNorm2d + LeakyReLU(0.2)", 2 * d, 4 * d)?;
        writeln!(f, "  (fc): Linear({}, 1)", 4 * d * 16)?;
        write!(f, ")")
    }
}
