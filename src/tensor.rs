use crate::autograd::{GradFn, is_grad_enabled};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::cell::RefCell;
use std::rc::Rc;

/// Type alias for a reference-counted, interior-mutable tensor.
///
/// `Rc<RefCell<RawTensor>>` lets several graph nodes refer to the same tensor
/// while still allowing gradient accumulation. Single-threaded only.
pub type Tensor = Rc<RefCell<RawTensor>>;

// ===== RAW TENSOR STRUCTURE =====

/// The core tensor structure containing data and gradient tracking
///
/// Fields:
/// - `data`: flat Vec<f32> of values (row-major order)
/// - `shape`: dimensions, e.g. [batch, channels, height, width]
/// - `grad`: accumulated gradient, same length as `data`
/// - `requires_grad`: whether to track gradients for this tensor
/// - `grad_fn`: function to compute parent gradients during backward
/// - `parents`: input tensors that this tensor depends on
pub struct RawTensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
    pub grad: Option<Vec<f32>>,
    pub requires_grad: bool,
    pub grad_fn: Option<Box<dyn GradFn>>,
    pub parents: Vec<Tensor>,
}

impl std::fmt::Debug for RawTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.is_some())
            .finish()
    }
}

// ===== TENSOR CONSTRUCTORS =====
impl RawTensor {
    /// Create a new tensor from data and shape
    ///
    /// # Panics
    /// Panics if data.len() != shape.product()
    pub fn new(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Tensor {
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "Data length must match shape {shape:?}"
        );
        Rc::new(RefCell::new(RawTensor {
            data,
            shape: shape.to_vec(),
            grad: None,
            requires_grad,
            grad_fn: None,
            parents: vec![],
        }))
    }

    /// Create a trainable leaf tensor (a parameter)
    pub fn parameter(data: Vec<f32>, shape: &[usize]) -> Tensor {
        Self::new(data, shape, true)
    }

    pub fn zeros(shape: &[usize]) -> Tensor {
        Self::constant(0.0, shape)
    }

    pub fn ones(shape: &[usize]) -> Tensor {
        Self::constant(1.0, shape)
    }

    pub fn constant(value: f32, shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        Self::new(vec![value; size], shape, false)
    }

    /// Values drawn i.i.d. from N(mean, std²)
    ///
    /// # Panics
    /// Panics if `std` is negative or not finite.
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], mean: f32, std: f32, rng: &mut R) -> Tensor {
        let size = shape.iter().product();
        Self::new(sample_normal(size, mean, std, rng), shape, false)
    }

    /// Values drawn i.i.d. from the continuous uniform distribution on [low, high]
    pub fn uniform<R: Rng + ?Sized>(shape: &[usize], low: f32, high: f32, rng: &mut R) -> Tensor {
        let size = shape.iter().product();
        let dist = Uniform::new_inclusive(low, high).expect("uniform bounds must be ordered");
        let data: Vec<f32> = (0..size).map(|_| dist.sample(rng)).collect();
        Self::new(data, shape, false)
    }

    /// Output node of a differentiable op.
    ///
    /// Gradient tracking is attached only when grad mode is on and at least one
    /// parent requires it; otherwise the result is a plain constant.
    pub(crate) fn from_op(
        data: Vec<f32>,
        shape: &[usize],
        parents: Vec<Tensor>,
        grad_fn: Box<dyn GradFn>,
    ) -> Tensor {
        let requires_grad = is_grad_enabled() && parents.iter().any(|p| p.borrow().requires_grad);
        let out = Self::new(data, shape, requires_grad);
        if requires_grad {
            let mut o = out.borrow_mut();
            o.parents = parents;
            o.grad_fn = Some(grad_fn);
        }
        out
    }

    /// Row-major strides for a shape
    pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }
}

pub(crate) fn sample_normal<R: Rng + ?Sized>(size: usize, mean: f32, std: f32, rng: &mut R) -> Vec<f32> {
    let normal = Normal::new(mean, std).expect("standard deviation must be finite and >= 0");
    (0..size).map(|_| normal.sample(rng)).collect()
}

// ===== NUMERICAL GRADIENT CHECKING =====

impl RawTensor {
    /// Check gradients numerically using central finite differences
    ///
    /// Analytical gradient: what `backward()` computes.
    /// Numerical gradient: (f(x+ε) - f(x-ε)) / (2ε)
    ///
    /// The relative error is measured against `max(|numerical|, 1)` so that
    /// near-zero gradients are compared in absolute terms.
    ///
    /// # Returns
    /// (max_error, mean_error, passed)
    pub fn check_gradients<F>(
        tensor: &Tensor,
        loss_fn: F,
        epsilon: f32,
        tolerance: f32,
    ) -> (f32, f32, bool)
    where
        F: Fn(&Tensor) -> Tensor,
    {
        tensor.borrow_mut().grad = None;
        let loss = loss_fn(tensor);
        loss.backward();

        let analytical_grad = tensor.grad().expect("Tensor must have gradient");
        let original_data = tensor.borrow().data.clone();
        let original_shape = tensor.borrow().shape.clone();

        let evaluate = |data: Vec<f32>| -> f32 {
            let probe = RawTensor::new(data, &original_shape, false);
            loss_fn(&probe).item()
        };

        let mut max_error: f32 = 0.0;
        let mut total_error: f32 = 0.0;

        for i in 0..original_data.len() {
            let mut data_plus = original_data.clone();
            data_plus[i] += epsilon;
            let mut data_minus = original_data.clone();
            data_minus[i] -= epsilon;

            let numerical = (evaluate(data_plus) - evaluate(data_minus)) / (2.0 * epsilon);
            let analytical = analytical_grad[i];
            let error = (analytical - numerical).abs() / numerical.abs().max(1.0);

            if error > tolerance {
                eprintln!(
                    "Gradient mismatch at index {i}: analytical={analytical:.6e}, numerical={numerical:.6e}, error={error:.6e}"
                );
            }
            max_error = max_error.max(error);
            total_error += error;
        }

        let mean_error = total_error / original_data.len().max(1) as f32;
        (max_error, mean_error, max_error < tolerance)
    }

    /// Gradient checker with epsilon=1e-2 and tolerance=1e-2
    pub fn check_gradients_simple<F>(tensor: &Tensor, loss_fn: F) -> bool
    where
        F: Fn(&Tensor) -> Tensor,
    {
        let (max_err, mean_err, passed) = Self::check_gradients(tensor, loss_fn, 1e-2, 1e-2);
        if !passed {
            eprintln!("Gradient check FAILED: max_error={max_err:.6e}, mean_error={mean_err:.6e}");
        }
        passed
    }
}

// ===== TRAIT-BASED API =====

/// Public trait for tensor operations
///
/// Gives the method syntax `x.add(&y)` instead of `RawTensor::add(&x, &y)`.
pub trait TensorOps {
    // Binary ops
    fn add(&self, other: &Tensor) -> Tensor;
    fn elem_mul(&self, other: &Tensor) -> Tensor;

    // Unary ops
    fn tanh(&self) -> Tensor;
    fn relu(&self) -> Tensor;
    fn leaky_relu(&self, negative_slope: f32) -> Tensor;

    // Reduce ops
    fn sum(&self) -> Tensor;

    // Movement ops
    fn reshape(&self, new_shape: &[usize]) -> Tensor;

    // Matmul
    fn matmul(&self, other: &Tensor) -> Tensor;

    // Gradient ops
    fn backward(&self);
    fn grad(&self) -> Option<Vec<f32>>;

    // Accessors
    fn shape(&self) -> Vec<usize>;
    fn to_vec(&self) -> Vec<f32>;
    /// First element; the value of a scalar loss
    fn item(&self) -> f32;
}

impl TensorOps for Tensor {
    fn add(&self, other: &Tensor) -> Tensor {
        RawTensor::add(self, other)
    }
    fn elem_mul(&self, other: &Tensor) -> Tensor {
        RawTensor::elem_mul(self, other)
    }

    fn tanh(&self) -> Tensor {
        RawTensor::tanh(self)
    }
    fn relu(&self) -> Tensor {
        RawTensor::relu(self)
    }
    fn leaky_relu(&self, negative_slope: f32) -> Tensor {
        RawTensor::leaky_relu(self, negative_slope)
    }

    fn sum(&self) -> Tensor {
        RawTensor::sum(self)
    }

    fn reshape(&self, new_shape: &[usize]) -> Tensor {
        RawTensor::reshape(self, new_shape)
    }

    fn matmul(&self, other: &Tensor) -> Tensor {
        RawTensor::matmul(self, other)
    }

    fn backward(&self) {
        RawTensor::backward(self)
    }
    fn grad(&self) -> Option<Vec<f32>> {
        self.borrow().grad.clone()
    }

    fn shape(&self) -> Vec<usize> {
        self.borrow().shape.clone()
    }
    fn to_vec(&self) -> Vec<f32> {
        self.borrow().data.clone()
    }
    fn item(&self) -> f32 {
        self.borrow().data.first().copied().unwrap_or(f32::NAN)
    }
}
