use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

/// Gradient function for reshape
///
/// Data order is unchanged, so the gradient passes through untouched and only
/// its shape is restored by the parent.
pub struct ReshapeGradFn;

impl GradFn for ReshapeGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        vec![Some(out_grad.data.clone())]
    }
}

impl RawTensor {
    /// Reinterpret the tensor with a new shape of the same element count
    ///
    /// # Panics
    /// Element count mismatch
    pub fn reshape(self_t: &Tensor, new_shape: &[usize]) -> Tensor {
        let data = {
            let s = self_t.borrow();
            let new_size: usize = new_shape.iter().product();
            assert_eq!(
                s.data.len(),
                new_size,
                "Cannot reshape {:?} into {:?}: size mismatch",
                s.shape,
                new_shape
            );
            s.data.clone()
        };
        Self::from_op(data, new_shape, vec![self_t.clone()], Box::new(ReshapeGradFn))
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn test_reshape_backward_restores_shape() {
        let x = RawTensor::new((0..6).map(|v| v as f32).collect(), &[2, 3], true);
        let y = x.reshape(&[3, 2]);
        assert_eq!(y.shape(), vec![3, 2]);
        y.sum().backward();
        assert_eq!(x.grad(), Some(vec![1.0; 6]));
    }
}
