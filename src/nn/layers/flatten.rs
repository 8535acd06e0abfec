use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// (B, C, H, W) feature maps -> (B, C·H·W) rows for a linear head
#[derive(Clone, Copy, Debug, Default)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Flatten
    }
}

impl Module for Flatten {
    fn forward(&self, x: &Tensor) -> Tensor {
        let (batch, features) = {
            let s = x.borrow();
            match s.shape.split_first() {
                Some((&batch, rest)) if !rest.is_empty() => (batch, rest.iter().product::<usize>()),
                _ => return x.clone(),
            }
        };
        x.reshape(&[batch, features])
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawTensor;

    #[test]
    fn test_discriminator_head_layout() {
        // 4d · 4 · 4 features per image for d = 32
        let y = Flatten::new().forward(&RawTensor::zeros(&[2, 128, 4, 4]));
        assert_eq!(y.shape(), vec![2, 2048]);
    }

    #[test]
    fn test_gradient_passes_through() {
        let x = RawTensor::new(vec![1.0; 8], &[2, 2, 2], true);
        Flatten::new().forward(&x).sum().backward();
        assert_eq!(x.grad(), Some(vec![1.0; 8]));
    }
}
