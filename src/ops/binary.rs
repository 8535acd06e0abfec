use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

/// Binary operations: two inputs, one output
///
/// Broadcasting follows `NumPy` rules for compatible shapes.
#[derive(Clone, Copy, Debug)]
pub enum BinaryOp {
    Add, // x + y, also bias broadcast
    Mul, // x * y (element-wise)
}

impl BinaryOp {
    fn apply(self, x: f32, y: f32) -> f32 {
        match self {
            BinaryOp::Add => x + y,
            BinaryOp::Mul => x * y,
        }
    }
}

/// Gradient function for binary operations
///
/// Gradients are summed over every dimension that was broadcast in the
/// forward pass, so each parent receives a gradient of its own shape.
pub struct BinaryGradFn {
    op: BinaryOp,
    // Inputs broadcast to the output shape
    x_full: Vec<f32>,
    y_full: Vec<f32>,
}

impl GradFn for BinaryGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let x = parents.first().expect("binary ops require 2 parents").borrow();
        let y = parents.get(1).expect("binary ops require 2 parents").borrow();
        let g = &out_grad.data;

        let (gx_full, gy_full): (Vec<f32>, Vec<f32>) = match self.op {
            BinaryOp::Add => (g.clone(), g.clone()),
            BinaryOp::Mul => (
                g.iter().zip(&self.y_full).map(|(g, y)| g * y).collect(),
                g.iter().zip(&self.x_full).map(|(g, x)| g * x).collect(),
            ),
        };

        let gx = x.requires_grad.then(|| {
            RawTensor::sum_over_broadcast_dims(&gx_full, &out_grad.shape, &x.shape)
        });
        let gy = y.requires_grad.then(|| {
            RawTensor::sum_over_broadcast_dims(&gy_full, &out_grad.shape, &y.shape)
        });
        vec![gx, gy]
    }
}

// ===== BINARY OPERATIONS =====
impl RawTensor {
    /// Compute broadcast shape following `NumPy` broadcasting rules
    ///
    /// Shapes are aligned from the right; each pair of dimensions must be equal
    /// or one of them must be 1.
    ///
    /// # Panics
    /// Incompatible shapes
    #[must_use]
    pub fn broadcast_shape(shape_a: &[usize], shape_b: &[usize]) -> Vec<usize> {
        let max_len = shape_a.len().max(shape_b.len());
        let dim_at = |shape: &[usize], i: usize| {
            if i < shape.len() {
                shape[shape.len() - 1 - i]
            } else {
                1
            }
        };

        let mut result = vec![1; max_len];
        for i in 0..max_len {
            let (a, b) = (dim_at(shape_a, i), dim_at(shape_b, i));
            result[max_len - 1 - i] = match (a, b) {
                _ if a == b => a,
                (1, _) => b,
                (_, 1) => a,
                _ => panic!("Cannot broadcast shapes {shape_a:?} and {shape_b:?}"),
            };
        }
        result
    }

    /// Repeat `data` along every dimension where `from_shape` is 1 (or
    /// missing) and `to_shape` is larger.
    pub(crate) fn broadcast_to(data: &[f32], from_shape: &[usize], to_shape: &[usize]) -> Vec<f32> {
        if from_shape == to_shape {
            return data.to_vec();
        }

        let offset = to_shape.len() - from_shape.len();
        let mut padded_from = vec![1; to_shape.len()];
        padded_from[offset..].copy_from_slice(from_shape);
        let from_strides = Self::compute_strides(&padded_from);
        let to_strides = Self::compute_strides(to_shape);

        let to_size: usize = to_shape.iter().product();
        (0..to_size)
            .map(|i| {
                let mut from_idx = 0;
                let mut rem = i;
                for dim in 0..to_shape.len() {
                    let coord = rem / to_strides[dim];
                    rem %= to_strides[dim];
                    if padded_from[dim] != 1 {
                        from_idx += coord * from_strides[dim];
                    }
                }
                data[from_idx]
            })
            .collect()
    }

    /// Sum a gradient of `grad_shape` down to `target_shape`, collapsing the
    /// dimensions that were broadcast.
    pub(crate) fn sum_over_broadcast_dims(
        grad: &[f32],
        grad_shape: &[usize],
        target_shape: &[usize],
    ) -> Vec<f32> {
        if grad_shape == target_shape {
            return grad.to_vec();
        }

        let offset = grad_shape.len() - target_shape.len();
        let mut padded_target = vec![1; grad_shape.len()];
        padded_target[offset..].copy_from_slice(target_shape);
        let target_strides = Self::compute_strides(&padded_target);
        let grad_strides = Self::compute_strides(grad_shape);

        let mut result = vec![0.0; target_shape.iter().product()];
        for (i, &g) in grad.iter().enumerate() {
            let mut target_idx = 0;
            let mut rem = i;
            for dim in 0..grad_shape.len() {
                let coord = rem / grad_strides[dim];
                rem %= grad_strides[dim];
                if padded_target[dim] != 1 {
                    target_idx += coord * target_strides[dim];
                }
            }
            result[target_idx] += g;
        }
        result
    }

    /// Apply a binary operation with broadcasting
    pub fn binary_op(self_t: &Tensor, other: &Tensor, op: BinaryOp) -> Tensor {
        let (x_full, y_full, out_shape) = {
            let a = self_t.borrow();
            let b = other.borrow();
            let out_shape = Self::broadcast_shape(&a.shape, &b.shape);
            (
                Self::broadcast_to(&a.data, &a.shape, &out_shape),
                Self::broadcast_to(&b.data, &b.shape, &out_shape),
                out_shape,
            )
        };

        let result: Vec<f32> = x_full
            .iter()
            .zip(&y_full)
            .map(|(&x, &y)| op.apply(x, y))
            .collect();

        let grad_fn = BinaryGradFn { op, x_full, y_full };
        Self::from_op(
            result,
            &out_shape,
            vec![self_t.clone(), other.clone()],
            Box::new(grad_fn),
        )
    }

    pub fn add(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Add)
    }
    pub fn elem_mul(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Mul)
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(RawTensor::broadcast_shape(&[3, 1], &[1, 4]), vec![3, 4]);
        assert_eq!(RawTensor::broadcast_shape(&[5, 3, 1], &[4]), vec![5, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "Cannot broadcast")]
    fn test_broadcast_shape_rejects_incompatible() {
        let _ = RawTensor::broadcast_shape(&[2, 3], &[4]);
    }

    #[test]
    fn test_bias_add_gradient_sums_over_batch() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], false);
        let b = RawTensor::new(vec![0.5, -0.5, 1.0], &[3], true);
        let y = x.add(&b);
        assert_eq!(y.to_vec(), vec![1.5, 1.5, 4.0, 4.5, 4.5, 7.0]);
        y.sum().backward();
        assert_eq!(b.grad(), Some(vec![2.0, 2.0, 2.0]));
    }

    #[test]
    fn test_broadcast_mul_gradient() {
        let x = RawTensor::new(vec![1.0, -2.0, 3.0, 0.5], &[2, 2], true);
        let scale = RawTensor::new(vec![2.0, -0.5], &[2], false);
        assert!(RawTensor::check_gradients_simple(&x, |t| {
            t.elem_mul(&scale).elem_mul(t).tanh().sum()
        }));
    }
}
