use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

/// Unary operations: single input, single output
///
/// The activations the networks use, with their derivatives:
/// - Tanh: d(tanh(x))/dx = 1 - tanh²(x)
/// - `ReLU`: d(max(0,x))/dx = x > 0 ? 1 : 0
/// - `LeakyReLU(α)`: x > 0 ? 1 : α
#[derive(Clone, Copy, Debug)]
pub enum UnaryOp {
    Tanh,
    ReLU,
    LeakyReLU(f32),
}

impl UnaryOp {
    fn apply(self, x: f32) -> f32 {
        match self {
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::ReLU => x.max(0.0),
            UnaryOp::LeakyReLU(slope) => {
                if x > 0.0 {
                    x
                } else {
                    slope * x
                }
            }
        }
    }

    /// ∂y/∂x evaluated at input `x` given output `y`
    fn derivative(self, x: f32, y: f32) -> f32 {
        match self {
            UnaryOp::Tanh => y.mul_add(-y, 1.0),
            UnaryOp::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            UnaryOp::LeakyReLU(slope) => {
                if x > 0.0 {
                    1.0
                } else {
                    slope
                }
            }
        }
    }
}

/// Gradient function for unary operations
///
/// Keeps the forward output so tanh does not recompute it.
pub struct UnaryGradFn {
    op: UnaryOp,
    output: Vec<f32>,
}

impl GradFn for UnaryGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let x = parents
            .first()
            .map(|p| p.borrow())
            .expect("unary ops require 1 parent");

        // Chain rule: ∂L/∂x = ∂L/∂y · ∂y/∂x
        let grad: Vec<f32> = out_grad
            .data
            .iter()
            .zip(&x.data)
            .zip(&self.output)
            .map(|((&g, &xv), &yv)| g * self.op.derivative(xv, yv))
            .collect();
        vec![Some(grad)]
    }
}

// ===== UNARY OPERATIONS =====
impl RawTensor {
    /// Apply a unary operation element-wise
    pub fn unary_op(t: &Tensor, op: UnaryOp) -> Tensor {
        let (result, shape) = {
            let s = t.borrow();
            let result: Vec<f32> = s.data.iter().map(|&x| op.apply(x)).collect();
            (result, s.shape.clone())
        };
        let grad_fn = UnaryGradFn {
            op,
            output: result.clone(),
        };
        Self::from_op(result, &shape, vec![t.clone()], Box::new(grad_fn))
    }

    pub fn tanh(t: &Tensor) -> Tensor {
        Self::unary_op(t, UnaryOp::Tanh)
    }
    pub fn relu(t: &Tensor) -> Tensor {
        Self::unary_op(t, UnaryOp::ReLU)
    }
    pub fn leaky_relu(t: &Tensor, negative_slope: f32) -> Tensor {
        Self::unary_op(t, UnaryOp::LeakyReLU(negative_slope))
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn test_leaky_relu_forward() {
        let x = RawTensor::new(vec![-2.0, 0.0, 3.0], &[3], false);
        let y = x.leaky_relu(0.2);
        assert_eq!(y.to_vec(), vec![-0.4, 0.0, 3.0]);
    }

    #[test]
    fn test_leaky_relu_gradient() {
        let x = RawTensor::new(vec![-1.5, -0.3, 0.7, 2.0], &[4], true);
        assert!(RawTensor::check_gradients_simple(&x, |t| t
            .leaky_relu(0.2)
            .sum()));
    }

    #[test]
    fn test_tanh_gradient() {
        let x = RawTensor::new(vec![-1.0, 0.1, 0.5], &[3], true);
        assert!(RawTensor::check_gradients_simple(&x, |t| t.tanh().sum()));
    }

    #[test]
    fn test_tanh_saturates_within_bounds() {
        let x = RawTensor::new(vec![-1e4, -50.0, 50.0, 1e4], &[4], false);
        let y = x.tanh().to_vec();
        assert!(y.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(y[0], -1.0);
        assert_eq!(y[3], 1.0);
    }
}
