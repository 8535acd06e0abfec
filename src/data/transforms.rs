use crate::tensor::{RawTensor, Tensor};

/// Map values in [0, 1] linearly onto `feature_range`
pub fn scale(data: &mut [f32], feature_range: (f32, f32)) {
    let (min, max) = feature_range;
    for x in data.iter_mut() {
        *x = *x * (max - min) + min;
    }
}

/// Scaled copy of an image batch, detached from any graph
#[must_use]
pub fn scale_tensor(t: &Tensor, feature_range: (f32, f32)) -> Tensor {
    let (mut data, shape) = {
        let b = t.borrow();
        (b.data.clone(), b.shape.clone())
    };
    scale(&mut data, feature_range);
    RawTensor::new(data, &shape, false)
}

/// Inverse of `scale` followed by truncation to 8-bit, for viewing generated images
#[must_use]
pub fn to_pixels(data: &[f32], feature_range: (f32, f32)) -> Vec<u8> {
    let (min, max) = feature_range;
    data.iter()
        .map(|&x| ((x - min) * 255.0 / (max - min)).clamp(0.0, 255.0) as u8)
        .collect()
}
