//! PNG rendering of saved generator samples.

use crate::data::to_pixels;
use crate::error::{FaceGanError, Result};
use crate::io::{TensorData, load_samples};
use crate::train::FEATURE_RANGE;
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::info;

pub const GRID_ROWS: usize = 2;
pub const GRID_COLS: usize = 8;

/// Tile the first `rows · cols` images of a (N, 3, H, W) batch in [-1, 1]
/// into one RGB image, row-major
pub fn sample_grid(batch: &TensorData, rows: usize, cols: usize) -> Result<RgbImage> {
    let [n, c, h, w] = batch.shape[..] else {
        return Err(FaceGanError::ShapeMismatch {
            expected: vec![rows * cols, 3, 0, 0],
            actual: batch.shape.clone(),
        });
    };
    if c != 3 || n < rows * cols {
        return Err(FaceGanError::ShapeMismatch {
            expected: vec![rows * cols, 3, h, w],
            actual: batch.shape.clone(),
        });
    }

    let pixels = to_pixels(&batch.data, FEATURE_RANGE);
    let plane = h * w;
    let mut grid = RgbImage::new((cols * w) as u32, (rows * h) as u32);
    for idx in 0..rows * cols {
        let img = &pixels[idx * 3 * plane..(idx + 1) * 3 * plane];
        let (x0, y0) = ((idx % cols) * w, (idx / cols) * h);
        for y in 0..h {
            for x in 0..w {
                let p = y * w + x;
                let rgb = Rgb([img[p], img[plane + p], img[2 * plane + p]]);
                grid.put_pixel((x0 + x) as u32, (y0 + y) as u32, rgb);
            }
        }
    }
    Ok(grid)
}

/// Render the samples of `epoch` (the last one when None) from a sample
/// history file as a 2×8 PNG grid
pub fn render_epoch<P: AsRef<Path>, Q: AsRef<Path>>(
    samples_path: P,
    epoch: Option<usize>,
    out: Q,
) -> Result<()> {
    let samples = load_samples(samples_path.as_ref())?;
    let index = epoch.unwrap_or(samples.len().saturating_sub(1));
    let batch = samples.get(index).ok_or(FaceGanError::MissingEpoch {
        epoch: index,
        available: samples.len(),
    })?;
    sample_grid(batch, GRID_ROWS, GRID_COLS)?.save(out.as_ref())?;
    info!(epoch = index, out = %out.as_ref().display(), "rendered sample grid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::save_samples;

    fn batch(n: usize, value: f32) -> TensorData {
        TensorData {
            data: vec![value; n * 3 * 4 * 4],
            shape: vec![n, 3, 4, 4],
        }
    }

    #[test]
    fn test_grid_dimensions() {
        let grid = sample_grid(&batch(16, 1.0), 2, 8).unwrap();
        assert_eq!(grid.dimensions(), (32, 8));
        assert_eq!(grid.get_pixel(31, 7), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_too_few_images() {
        assert!(matches!(
            sample_grid(&batch(4, 0.0), 2, 8),
            Err(FaceGanError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_render_last_epoch_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples.bin");
        let out = dir.path().join("grid.png");
        save_samples(&[batch(16, -1.0), batch(16, 1.0)], &samples).unwrap();

        render_epoch(&samples, None, &out).unwrap();
        let img = image::open(&out).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 255, 255]));

        assert!(matches!(
            render_epoch(&samples, Some(5), &out),
            Err(FaceGanError::MissingEpoch { epoch: 5, available: 2 })
        ));
    }
}
