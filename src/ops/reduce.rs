use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

/// Gradient function for the full sum: the scalar output gradient is
/// broadcast back over every input element.
pub struct SumGradFn;

impl GradFn for SumGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let size = parents
            .first()
            .expect("sum requires 1 parent")
            .borrow()
            .data
            .len();
        vec![Some(vec![out_grad.data[0]; size])]
    }
}

impl RawTensor {
    /// Σ of every element, as a shape-[1] tensor
    pub fn sum(self_t: &Tensor) -> Tensor {
        let value = self_t.borrow().data.iter().sum();
        Self::from_op(vec![value], &[1], vec![self_t.clone()], Box::new(SumGradFn))
    }
}
