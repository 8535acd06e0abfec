use crate::tensor::{RawTensor, Tensor};
use std::cell::Cell;
use std::collections::HashSet;

// ===== GRADIENT FUNCTION TRAIT =====

/// Trait for gradient computation functions.
///
/// Each operation type implements this to define how gradients flow backward.
/// `backward` receives the gradient of the loss w.r.t. this operation's output
/// and the input tensors, and returns one gradient per parent (None for
/// parents that do not need one). Every returned gradient has the same length
/// as its parent's data.
pub trait GradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>>;
}

// ===== GRAD MODE =====

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

/// Run `f` without recording a computation graph.
///
/// Results produced inside are plain constants even when their inputs are
/// parameters. Used for sampling snapshots.
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    struct Restore(bool);
    impl Drop for Restore {
        fn drop(&mut self) {
            GRAD_ENABLED.with(|g| g.set(self.0));
        }
    }

    let _restore = Restore(GRAD_ENABLED.with(|g| g.replace(false)));
    f()
}

// ===== BACKPROPAGATION =====

impl RawTensor {
    /// Run backpropagation starting from this tensor
    ///
    /// Reverse-mode automatic differentiation:
    /// 1. Seed this tensor's gradient with ones (a scalar loss gets 1.0)
    /// 2. Build a topological order of the graph (iterative post-order DFS)
    /// 3. Visit nodes consumers-first, calling each `grad_fn`
    /// 4. Accumulate gradients into parents
    ///
    /// # Panics
    /// Calling on a tensor that doesn't require gradients
    pub fn backward(tensor_ref: &Tensor) {
        enum Action {
            Visit(Tensor),
            PostVisit(Tensor),
        }

        {
            let mut tensor = tensor_ref.borrow_mut();
            assert!(
                tensor.requires_grad,
                "Called backward on a tensor that doesn't require grad"
            );
            if tensor.grad.is_none() {
                tensor.grad = Some(vec![1.0; tensor.data.len()]);
            }
        }

        // A plain visited set is not enough for diamond-shaped graphs: a node
        // must only run after all its consumers contributed gradient.
        let mut topo_order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![Action::Visit(tensor_ref.clone())];

        while let Some(action) = stack.pop() {
            match action {
                Action::Visit(t) => {
                    if !visited.insert(t.as_ptr()) {
                        continue;
                    }
                    stack.push(Action::PostVisit(t.clone()));
                    for parent in t.borrow().parents.iter() {
                        stack.push(Action::Visit(parent.clone()));
                    }
                }
                Action::PostVisit(t) => topo_order.push(t),
            }
        }

        // topo_order is [leaf, ..., root]; walk it root first
        for tensor in topo_order.into_iter().rev() {
            let t = tensor.borrow();
            let (Some(grad_fn), Some(grad)) = (t.grad_fn.as_ref(), t.grad.as_ref()) else {
                continue;
            };

            let grad_out = RawTensor {
                data: grad.clone(),
                shape: t.shape.clone(),
                grad: None,
                requires_grad: false,
                grad_fn: None,
                parents: vec![],
            };
            let parent_grads = grad_fn.backward(&grad_out, &t.parents);

            for (parent_grad, parent_ref) in parent_grads.into_iter().zip(t.parents.iter()) {
                let Some(g) = parent_grad else { continue };
                let mut parent = parent_ref.borrow_mut();
                if !parent.requires_grad {
                    continue;
                }
                assert_eq!(
                    g.len(),
                    parent.data.len(),
                    "Gradient size mismatch during accumulation"
                );
                match parent.grad {
                    None => parent.grad = Some(g),
                    Some(ref mut existing) => {
                        for (a, b) in existing.iter_mut().zip(g.iter()) {
                            *a += *b;
                        }
                    }
                }
            }
        }
    }
}
