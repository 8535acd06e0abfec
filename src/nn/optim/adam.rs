use crate::tensor::Tensor;

/// Adam with bias-corrected moment estimates and optional L2 weight decay
pub struct Adam {
    params: Vec<Tensor>,
    lr: f32,
    betas: (f32, f32),
    eps: f32,
    weight_decay: f32,
    m: Vec<Vec<f32>>, // 1st moment
    v: Vec<Vec<f32>>, // 2nd moment
    t: usize,         // timestep
}

impl Adam {
    #[must_use]
    pub fn new(
        params: Vec<Tensor>,
        lr: f32,
        betas: (f32, f32),
        eps: f32,
        weight_decay: f32,
    ) -> Self {
        let zeros = |p: &Tensor| vec![0.0; p.borrow().data.len()];
        let m = params.iter().map(zeros).collect();
        let v = params.iter().map(zeros).collect();

        Adam {
            params,
            lr,
            betas,
            eps,
            weight_decay,
            m,
            v,
            t: 0,
        }
    }

    pub fn zero_grad(&self) {
        for param in &self.params {
            param.borrow_mut().grad = None;
        }
    }

    /// Number of `step` calls so far
    pub fn steps(&self) -> usize {
        self.t
    }

    pub fn lr(&self) -> f32 {
        self.lr
    }

    pub fn params(&self) -> &[Tensor] {
        &self.params
    }

    pub fn step(&mut self) {
        self.t += 1;

        // Bias correction
        let m_hat_scale = 1.0 / (1.0 - self.betas.0.powi(self.t as i32));
        let v_hat_scale = 1.0 / (1.0 - self.betas.1.powi(self.t as i32));
        let (beta1, beta2) = self.betas;

        for ((param, m), v) in self.params.iter().zip(&mut self.m).zip(&mut self.v) {
            let mut p = param.borrow_mut();
            // Skip parameters without gradients
            let Some(mut grad) = p.grad.take() else {
                continue;
            };

            if self.weight_decay != 0.0 {
                for (g, theta) in grad.iter_mut().zip(p.data.iter()) {
                    *g += self.weight_decay * *theta;
                }
            }

            for (j, &g) in grad.iter().enumerate() {
                m[j] = beta1 * m[j] + (1.0 - beta1) * g;
                v[j] = beta2 * v[j] + (1.0 - beta2) * g * g;
                let m_hat = m[j] * m_hat_scale;
                let v_hat = v[j] * v_hat_scale;
                p.data[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
            p.grad = Some(grad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn test_first_step_moves_by_lr() {
        // With bias correction the first update is lr · g/|g|
        let p = RawTensor::parameter(vec![1.0, -1.0], &[2]);
        let mut opt = Adam::new(vec![p.clone()], 0.1, (0.5, 0.999), 1e-8, 0.0);
        p.borrow_mut().grad = Some(vec![3.0, -0.5]);
        opt.step();
        let data = p.borrow().data.clone();
        assert!((data[0] - 0.9).abs() < 1e-5);
        assert!((data[1] + 0.9).abs() < 1e-5);
        assert_eq!(opt.steps(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let x = RawTensor::parameter(vec![4.0], &[1]);
        let mut opt = Adam::new(vec![x.clone()], 0.1, (0.9, 0.999), 1e-8, 0.0);
        for _ in 0..300 {
            opt.zero_grad();
            x.elem_mul(&x).sum().backward();
            opt.step();
        }
        assert!(x.borrow().data[0].abs() < 0.1);
    }

    #[test]
    fn test_params_without_grad_are_untouched() {
        let a = RawTensor::parameter(vec![1.0], &[1]);
        let b = RawTensor::parameter(vec![2.0], &[1]);
        let mut opt = Adam::new(vec![a.clone(), b.clone()], 0.1, (0.5, 0.999), 1e-8, 0.0);
        a.borrow_mut().grad = Some(vec![1.0]);
        opt.step();
        assert_ne!(a.borrow().data[0], 1.0);
        assert_eq!(b.borrow().data[0], 2.0);
    }
}
