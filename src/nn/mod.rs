use crate::io::StateDict;
use crate::tensor::Tensor;

pub mod init;
pub mod layers;
pub mod loss;
pub mod optim;

pub use init::{Initialize, WeightInit};
pub use layers::{BatchNorm2d, Conv2d, ConvTranspose2d, Flatten, LeakyReLU, Linear, ReLU, Tanh};
pub use loss::{bce_with_logits_loss, fake_loss, real_loss};
pub use optim::Adam;

pub trait Module {
    fn forward(&self, x: &Tensor) -> Tensor;
    fn parameters(&self) -> Vec<Tensor>;

    /// Named parameters and buffers, keyed like `conv2.weight`
    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    /// Overwrite parameters and buffers from `state`; unknown keys are ignored.
    /// Use `io::load_state_dict_checked` to find out what did not match.
    fn load_state_dict(&mut self, _state: &StateDict) {}

    /// Switch between training and evaluation modes.
    /// Only matters for layers with batch statistics.
    fn train(&mut self, _mode: bool) {}

    fn eval(&mut self) {
        self.train(false);
    }

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.borrow().data.len()).sum()
    }
}
