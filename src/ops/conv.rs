//! Patch extraction shared by `Conv2d` and `ConvTranspose2d`.
//!
//! A convolution over one image is lowered to a matmul over its column
//! matrix: `im2col` turns a (C, H, W) image into a (C·K·K, OH·OW) matrix whose
//! column j holds the receptive field of output pixel j. `col2im` is the exact
//! adjoint and scatters-and-adds a column matrix back into an image.

use crate::autograd::GradFn;
use crate::ops::matmul::{matmul_a_bt, matmul_at_b, matmul_raw};
use crate::{RawTensor, Tensor};

/// Square kernel geometry: kernel size, stride and zero padding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
}

impl ConvGeometry {
    pub fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        assert!(kernel > 0 && stride > 0, "kernel and stride must be positive");
        ConvGeometry {
            kernel,
            stride,
            padding,
        }
    }

    /// Spatial size produced by a convolution over `input` pixels
    ///
    /// # Panics
    /// If the padded input is smaller than the kernel
    pub fn conv_output(&self, input: usize) -> usize {
        let padded = input + 2 * self.padding;
        assert!(
            padded >= self.kernel,
            "input size {input} with padding {} is smaller than kernel {}",
            self.padding,
            self.kernel
        );
        (padded - self.kernel) / self.stride + 1
    }

    /// Spatial size produced by a transposed convolution over `input` pixels
    ///
    /// `H_out = (H_in - 1)·stride + kernel - 2·padding`
    pub fn transpose_output(&self, input: usize) -> usize {
        let full = (input - 1) * self.stride + self.kernel;
        assert!(
            full > 2 * self.padding,
            "transposed convolution output would be empty"
        );
        full - 2 * self.padding
    }

    /// Image coordinate read by output position `out` at kernel offset `k`,
    /// or None when it falls in the zero padding.
    #[inline]
    fn source(&self, out: usize, k: usize, size: usize) -> Option<usize> {
        let pos = (out * self.stride + k).checked_sub(self.padding)?;
        (pos < size).then_some(pos)
    }
}

/// (C, H, W) image -> (C·K·K, OH·OW) column matrix
pub fn im2col(
    image: &[f32],
    channels: usize,
    (height, width): (usize, usize),
    geo: ConvGeometry,
    (out_h, out_w): (usize, usize),
) -> Vec<f32> {
    let k = geo.kernel;
    let cols = out_h * out_w;
    let mut result = vec![0.0; channels * k * k * cols];

    for c in 0..channels {
        let plane = &image[c * height * width..(c + 1) * height * width];
        for kh in 0..k {
            for kw in 0..k {
                let row = (c * k + kh) * k + kw;
                let dst = &mut result[row * cols..(row + 1) * cols];
                for oh in 0..out_h {
                    let Some(ih) = geo.source(oh, kh, height) else {
                        continue;
                    };
                    for ow in 0..out_w {
                        if let Some(iw) = geo.source(ow, kw, width) {
                            dst[oh * out_w + ow] = plane[ih * width + iw];
                        }
                    }
                }
            }
        }
    }
    result
}

/// (C·K·K, OH·OW) column matrix -> (C, H, W) image, summing overlaps
pub fn col2im(
    cols: &[f32],
    channels: usize,
    (height, width): (usize, usize),
    geo: ConvGeometry,
    (out_h, out_w): (usize, usize),
) -> Vec<f32> {
    let k = geo.kernel;
    let n_cols = out_h * out_w;
    let mut image = vec![0.0; channels * height * width];

    for c in 0..channels {
        let plane = &mut image[c * height * width..(c + 1) * height * width];
        for kh in 0..k {
            for kw in 0..k {
                let row = (c * k + kh) * k + kw;
                let src = &cols[row * n_cols..(row + 1) * n_cols];
                for oh in 0..out_h {
                    let Some(ih) = geo.source(oh, kh, height) else {
                        continue;
                    };
                    for ow in 0..out_w {
                        if let Some(iw) = geo.source(ow, kw, width) {
                            plane[ih * width + iw] += src[oh * out_w + ow];
                        }
                    }
                }
            }
        }
    }
    image
}

/// Per-op shape bookkeeping shared by forward and backward
#[derive(Clone, Copy, Debug)]
struct ConvDims {
    batch: usize,
    in_channels: usize,
    out_channels: usize,
    in_hw: (usize, usize),
    out_hw: (usize, usize),
}

fn image_dims(shape: &[usize], op: &str) -> (usize, usize, usize, usize) {
    assert_eq!(shape.len(), 4, "{op} expects a 4D (B,C,H,W) input, got {shape:?}");
    (shape[0], shape[1], shape[2], shape[3])
}

fn add_bias(out: &mut [f32], bias: &[f32], plane: usize) {
    for (chunk, &b) in out.chunks_mut(plane).zip(bias.iter().cycle()) {
        chunk.iter_mut().for_each(|v| *v += b);
    }
}

/// Σ over batch and spatial positions of a (B, C, H, W) gradient, per channel
fn channel_sums(grad: &[f32], channels: usize, plane: usize) -> Vec<f32> {
    let mut sums = vec![0.0; channels];
    for (i, chunk) in grad.chunks(plane).enumerate() {
        sums[i % channels] += chunk.iter().sum::<f32>();
    }
    sums
}

// ===== CONV2D =====

/// Gradient function for `conv2d`
///
/// With Y_b = W · cols(X_b):
/// - ∂L/∂W = Σ_b ∂L/∂Y_b · cols(X_b)ᵀ
/// - ∂L/∂X_b = col2im(Wᵀ · ∂L/∂Y_b)
/// - ∂L/∂bias = Σ over batch and pixels
pub struct Conv2dGradFn {
    geo: ConvGeometry,
    dims: ConvDims,
    /// im2col of every batch item, kept from the forward pass
    cols: Vec<Vec<f32>>,
}

impl GradFn for Conv2dGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let ConvDims {
            batch,
            in_channels,
            out_channels,
            in_hw,
            out_hw,
        } = self.dims;
        let x = parents.first().expect("conv2d requires an input").borrow();
        let w = parents.get(1).expect("conv2d requires a weight").borrow();
        let patch = in_channels * self.geo.kernel * self.geo.kernel;
        let out_plane = out_hw.0 * out_hw.1;
        let in_size = in_channels * in_hw.0 * in_hw.1;

        let mut grad_x = x.requires_grad.then(|| vec![0.0; batch * in_size]);
        let mut grad_w = w.requires_grad.then(|| vec![0.0; w.data.len()]);

        for b in 0..batch {
            let dy = &out_grad.data[b * out_channels * out_plane..(b + 1) * out_channels * out_plane];
            if let Some(gw) = grad_w.as_mut() {
                let part = matmul_a_bt(dy, &self.cols[b], out_channels, out_plane, patch);
                gw.iter_mut().zip(&part).for_each(|(g, p)| *g += p);
            }
            if let Some(gx) = grad_x.as_mut() {
                let dcols = matmul_at_b(&w.data, dy, out_channels, patch, out_plane);
                let dx = col2im(&dcols, in_channels, in_hw, self.geo, out_hw);
                gx[b * in_size..(b + 1) * in_size].copy_from_slice(&dx);
            }
        }

        let mut grads = vec![grad_x, grad_w];
        if let Some(bias) = parents.get(2) {
            grads.push(
                bias.borrow()
                    .requires_grad
                    .then(|| channel_sums(&out_grad.data, out_channels, out_plane)),
            );
        }
        grads
    }
}

// ===== TRANSPOSED CONV2D =====

/// Gradient function for `conv_transpose2d`
///
/// The forward pass is the adjoint of a convolution, so the roles of
/// `im2col` and `col2im` swap:
/// - ∂L/∂X_b = W · cols(∂L/∂Y_b)
/// - ∂L/∂W = Σ_b X_b · cols(∂L/∂Y_b)ᵀ
pub struct ConvTranspose2dGradFn {
    geo: ConvGeometry,
    dims: ConvDims,
}

impl GradFn for ConvTranspose2dGradFn {
    fn backward(&self, out_grad: &RawTensor, parents: &[Tensor]) -> Vec<Option<Vec<f32>>> {
        let ConvDims {
            batch,
            in_channels,
            out_channels,
            in_hw,
            out_hw,
        } = self.dims;
        let x = parents.first().expect("conv_transpose2d requires an input").borrow();
        let w = parents.get(1).expect("conv_transpose2d requires a weight").borrow();
        let patch = out_channels * self.geo.kernel * self.geo.kernel;
        let in_plane = in_hw.0 * in_hw.1;
        let out_size = out_channels * out_hw.0 * out_hw.1;

        let mut grad_x = x.requires_grad.then(|| vec![0.0; x.data.len()]);
        let mut grad_w = w.requires_grad.then(|| vec![0.0; w.data.len()]);

        for b in 0..batch {
            let dy = &out_grad.data[b * out_size..(b + 1) * out_size];
            let dcols = im2col(dy, out_channels, out_hw, self.geo, in_hw);
            if let Some(gx) = grad_x.as_mut() {
                let dx = matmul_raw(&w.data, &dcols, in_channels, patch, in_plane);
                gx[b * in_channels * in_plane..(b + 1) * in_channels * in_plane].copy_from_slice(&dx);
            }
            if let Some(gw) = grad_w.as_mut() {
                let x_b = &x.data[b * in_channels * in_plane..(b + 1) * in_channels * in_plane];
                let part = matmul_a_bt(x_b, &dcols, in_channels, in_plane, patch);
                gw.iter_mut().zip(&part).for_each(|(g, p)| *g += p);
            }
        }

        let mut grads = vec![grad_x, grad_w];
        if let Some(bias) = parents.get(2) {
            grads.push(
                bias.borrow()
                    .requires_grad
                    .then(|| channel_sums(&out_grad.data, out_channels, out_hw.0 * out_hw.1)),
            );
        }
        grads
    }
}

impl RawTensor {
    /// 2D convolution: (B, C, H, W) * (O, C, K, K) -> (B, O, OH, OW)
    ///
    /// # Panics
    /// Non-4D input, or channel count that disagrees with the weight
    pub fn conv2d(x_t: &Tensor, weight: &Tensor, bias: Option<&Tensor>, geo: ConvGeometry) -> Tensor {
        let (out, dims, cols) = {
            let x = x_t.borrow();
            let w = weight.borrow();
            let (batch, channels, h, width) = image_dims(&x.shape, "conv2d");
            let out_channels = w.shape[0];
            assert_eq!(
                w.shape[1..],
                [channels, geo.kernel, geo.kernel],
                "conv2d weight {:?} does not fit input {:?}",
                w.shape,
                x.shape
            );
            let out_hw = (geo.conv_output(h), geo.conv_output(width));
            let out_plane = out_hw.0 * out_hw.1;
            let patch = channels * geo.kernel * geo.kernel;
            let in_size = channels * h * width;

            let mut out = Vec::with_capacity(batch * out_channels * out_plane);
            let mut cols = Vec::with_capacity(batch);
            for b in 0..batch {
                let c = im2col(&x.data[b * in_size..(b + 1) * in_size], channels, (h, width), geo, out_hw);
                out.extend(matmul_raw(&w.data, &c, out_channels, patch, out_plane));
                cols.push(c);
            }
            if let Some(bias) = bias {
                add_bias(&mut out, &bias.borrow().data, out_plane);
            }
            let dims = ConvDims {
                batch,
                in_channels: channels,
                out_channels,
                in_hw: (h, width),
                out_hw,
            };
            (out, dims, cols)
        };

        let mut parents = vec![x_t.clone(), weight.clone()];
        parents.extend(bias.cloned());
        Self::from_op(
            out,
            &[dims.batch, dims.out_channels, dims.out_hw.0, dims.out_hw.1],
            parents,
            Box::new(Conv2dGradFn { geo, dims, cols }),
        )
    }

    /// Transposed 2D convolution: (B, C, H, W) with weight (C, O, K, K) -> (B, O, OH, OW)
    /// where `OH = (H - 1)·stride + K - 2·padding`
    ///
    /// # Panics
    /// Non-4D input, or channel count that disagrees with the weight
    pub fn conv_transpose2d(
        x_t: &Tensor,
        weight: &Tensor,
        bias: Option<&Tensor>,
        geo: ConvGeometry,
    ) -> Tensor {
        let (out, dims) = {
            let x = x_t.borrow();
            let w = weight.borrow();
            let (batch, channels, h, width) = image_dims(&x.shape, "conv_transpose2d");
            assert_eq!(
                w.shape[0], channels,
                "conv_transpose2d weight {:?} does not fit input {:?}",
                w.shape, x.shape
            );
            let out_channels = w.shape[1];
            let out_hw = (geo.transpose_output(h), geo.transpose_output(width));
            let in_plane = h * width;
            let patch = out_channels * geo.kernel * geo.kernel;

            let mut out = Vec::with_capacity(batch * out_channels * out_hw.0 * out_hw.1);
            for b in 0..batch {
                let x_b = &x.data[b * channels * in_plane..(b + 1) * channels * in_plane];
                let cols = matmul_at_b(&w.data, x_b, channels, patch, in_plane);
                out.extend(col2im(&cols, out_channels, out_hw, geo, (h, width)));
            }
            if let Some(bias) = bias {
                add_bias(&mut out, &bias.borrow().data, out_hw.0 * out_hw.1);
            }
            let dims = ConvDims {
                batch,
                in_channels: channels,
                out_channels,
                in_hw: (h, width),
                out_hw,
            };
            (out, dims)
        };

        let mut parents = vec![x_t.clone(), weight.clone()];
        parents.extend(bias.cloned());
        Self::from_op(
            out,
            &[dims.batch, dims.out_channels, dims.out_hw.0, dims.out_hw.1],
            parents,
            Box::new(ConvTranspose2dGradFn { geo, dims }),
        )
    }
}
