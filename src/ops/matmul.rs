use crate::autograd::GradFn;
use crate::{RawTensor, Tensor};

// ===== RAW KERNELS =====
//
// Row-major, naive O(mnk) loops in i-p-j order so the innermost loop walks
// contiguous memory in both the right operand and the result.

/// (m,k) @ (k,n) -> (m,n)
pub fn matmul_raw(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut result = vec![0.0; m * n];
    for i in 0..m {
        let row = &mut result[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for (r, &b_pj) in row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *r += a_ip * b_pj;
            }
        }
    }
    result
}

/// Aᵀ @ B where A is (k,m) and B is (k,n) -> (m,n)
pub fn matmul_at_b(a: &[f32], b: &[f32], k: usize, m: usize, n: usize) -> Vec<f32> {
    let mut result = vec![0.0; m * n];
    for p in 0..k {
        let b_row = &b[p * n..(p + 1) * n];
        for i in 0..m {
            let a_pi = a[p * m + i];
            if a_pi == 0.0 {
                continue;
            }
            for (r, &b_pj) in result[i * n..(i + 1) * n].iter_mut().zip(b_row) {
                *r += a_pi * b_pj;
            }
        }
    }
    result
}

/// A @ Bᵀ where A is (m,k) and B is (n,k) -> (m,n)
pub fn matmul_a_bt(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut result = vec![0.0; m * n];
    for i in 0..m {
        let a_row = &a[i * k..(i + 1) * k];
        for j in 0..n {
            let b_row = &b[j * k..(j + 1) * k];
            result[i * n + j] = a_row.iter().zip(b_row).map(|(x, y)| x * y).sum();
        }
    }
    result
}

// ===== MATRIX MULTIPLICATION =====

/// Gradient function for 2D matmul
///
/// For C = A @ B:
/// - ∂L/∂A = ∂L/∂C @ Bᵀ
/// - ∂L/∂B = Aᵀ @ ∂L/∂C
pub struct MatMulGradFn {
    m: usize,
    k: usize,
    n: usize,
}

impl GradFn for MatMulGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let a = parents.first().expect("matmul requires 2 parents").borrow();
        let b = parents.get(1).expect("matmul requires 2 parents").borrow();
        let (m, k, n) = (self.m, self.k, self.n);

        let grad_a = a
            .requires_grad
            .then(|| matmul_a_bt(&out_grad.data, &b.data, m, n, k));
        let grad_b = b
            .requires_grad
            .then(|| matmul_at_b(&a.data, &out_grad.data, m, k, n));
        vec![grad_a, grad_b]
    }
}

impl RawTensor {
    /// Standard 2D matmul: (m,k) @ (k,n) -> (m,n)
    ///
    /// # Panics
    /// Non-2D operands or mismatched inner dimensions
    pub fn matmul(self_t: &Tensor, other: &Tensor) -> Tensor {
        let (result, m, k, n) = {
            let a = self_t.borrow();
            let b = other.borrow();
            assert!(
                a.shape.len() == 2 && b.shape.len() == 2,
                "matmul expects 2D operands, got {:?} @ {:?}",
                a.shape,
                b.shape
            );
            let (m, k) = (a.shape[0], a.shape[1]);
            let (k2, n) = (b.shape[0], b.shape[1]);
            assert_eq!(k, k2, "Matmul dimension mismatch: ({m},{k}) @ ({k2},{n})");
            (matmul_raw(&a.data, &b.data, m, k, n), m, k, n)
        };

        Self::from_op(
            result,
            &[m, n],
            vec![self_t.clone(), other.clone()],
            Box::new(MatMulGradFn { m, k, n }),
        )
    }
}
