pub mod batchnorm;
pub mod conv;
pub mod conv_transpose;
pub mod flatten;
pub mod leaky_relu;
pub mod linear;
pub mod relu;
pub mod tanh;

pub use batchnorm::BatchNorm2d;
pub use conv::Conv2d;
pub use conv_transpose::ConvTranspose2d;
pub use flatten::Flatten;
pub use leaky_relu::LeakyReLU;
pub use linear::Linear;
pub use relu::ReLU;
pub use tanh::Tanh;
