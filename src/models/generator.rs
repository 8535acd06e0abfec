use crate::io::{StateDict, insert_prefixed, sub_state};
use crate::nn::{BatchNorm2d, ConvTranspose2d, Initialize, Linear, Module, ReLU, Tanh, WeightInit};
use crate::tensor::{Tensor, TensorOps};
use rand::Rng;
use std::fmt;

/// Maps latent vectors to 32×32 RGB images in [-1, 1]
///
/// A linear layer lifts z to a (4g, 4, 4) volume; three transposed
/// convolutions upsample 4 → 8 → 16 → 32 while the depth shrinks to 3.
pub struct Generator {
    z_size: usize,
    conv_dim: usize,
    fc: Linear,
    deconv1: ConvTranspose2d,
    bn1: BatchNorm2d,
    deconv2: ConvTranspose2d,
    bn2: BatchNorm2d,
    deconv3: ConvTranspose2d,
    relu: ReLU,
    tanh: Tanh,
}

impl Generator {
    pub fn new<R: Rng + ?Sized>(z_size: usize, conv_dim: usize, rng: &mut R) -> Self {
        let g = conv_dim;
        Generator {
            z_size,
            conv_dim,
            fc: Linear::new(z_size, 4 * g * 4 * 4, true, rng),
            deconv1: ConvTranspose2d::new(4 * g, 2 * g, 4, 2, 1, false, rng),
            bn1: BatchNorm2d::new(2 * g),
            deconv2: ConvTranspose2d::new(2 * g, g, 4, 2, 1, false, rng),
            bn2: BatchNorm2d::new(g),
            // no batch norm on the output layer
            deconv3: ConvTranspose2d::new(g, 3, 4, 2, 1, false, rng),
            relu: ReLU,
            tanh: Tanh,
        }
    }

    pub fn z_size(&self) -> usize {
        self.z_size
    }

    pub fn conv_dim(&self) -> usize {
        self.conv_dim
    }

    pub fn init_weights<R: Rng + ?Sized>(&self, init: &WeightInit, rng: &mut R) {
        self.fc.initialize(init, rng);
        self.deconv1.initialize(init, rng);
        self.bn1.initialize(init, rng);
        self.deconv2.initialize(init, rng);
        self.bn2.initialize(init, rng);
        self.deconv3.initialize(init, rng);
    }
}

impl Module for Generator {
    /// (B, z_size) latent vectors -> (B, 3, 32, 32) images
    fn forward(&self, z: &Tensor) -> Tensor {
        let batch = z.borrow().shape[0];
        let x = self.fc.forward(z).reshape(&[batch, 4 * self.conv_dim, 4, 4]);
        let x = self.relu.forward(&self.bn1.forward(&self.deconv1.forward(&x)));
        let x = self.relu.forward(&self.bn2.forward(&self.deconv2.forward(&x)));
        self.tanh.forward(&self.deconv3.forward(&x))
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.fc.parameters();
        params.extend(self.deconv1.parameters());
        params.extend(self.bn1.parameters());
        params.extend(self.deconv2.parameters());
        params.extend(self.bn2.parameters());
        params.extend(self.deconv3.parameters());
        params
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        insert_prefixed(&mut state, "fc", self.fc.state_dict());
        insert_prefixed(&mut state, "deconv1", self.deconv1.state_dict());
        insert_prefixed(&mut state, "bn1", self.bn1.state_dict());
        insert_prefixed(&mut state, "deconv2", self.deconv2.state_dict());
        insert_prefixed(&mut state, "bn2", self.bn2.state_dict());
        insert_prefixed(&mut state, "deconv3", self.deconv3.state_dict());
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        self.fc.load_state_dict(&sub_state(state, "fc"));
        self.deconv1.load_state_dict(&sub_state(state, "deconv1"));
        self.bn1.load_state_dict(&sub_state(state, "bn1"));
        self.deconv2.load_state_dict(&sub_state(state, "deconv2"));
        self.bn2.load_state_dict(&sub_state(state, "bn2"));
        self.deconv3.load_state_dict(&sub_state(state, "deconv3"));
    }

    fn train(&mut self, mode: bool) {
        self.bn1.train(mode);
        self.bn2.train(mode);
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.conv_dim;
        writeln!(f, "Generator(")?;
        writeln!(f, "  (fc): Linear({}, {})", self.z_size, 4 * g * 16)?;
        writeln!(f, "  (deconv1): ConvTranspose2d({}, {}, k=4, s=2, p=1) + BatchNorm2d + ReLU", 4 * g, 2 * g)?;
        writeln!(f, "  (deconv2): ConvTranspose2d({}, {g}, k=4, s=2, p=1) + BatchNorm2d + ReLU", 2 * g)?;
        writeln!(f, "  (deconv3): ConvTranspose2d({g}, 3, k=4, s=2, p=1) + Tanh")?;
        write!(f, ")")
    }
}
