// Operation enums and gradient functions
pub mod binary;
pub mod conv;
pub mod matmul;
pub mod movement;
pub mod norm;
pub mod reduce;
pub mod unary;

pub use binary::{BinaryGradFn, BinaryOp};
pub use conv::{Conv2dGradFn, ConvGeometry, ConvTranspose2dGradFn};
pub use matmul::{MatMulGradFn, matmul_a_bt, matmul_at_b, matmul_raw};
pub use movement::ReshapeGradFn;
pub use norm::{BatchNormGradFn, ChannelStats};
pub use reduce::SumGradFn;
pub use unary::{UnaryGradFn, UnaryOp};
