pub mod image_folder;
pub mod transforms;

pub use image_folder::ImageFolder;
pub use transforms::{scale, scale_tensor, to_pixels};

use crate::error::Result;
use crate::tensor::{RawTensor, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One decoded image with its class label
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// CHW floats in [0, 1]
    pub image: Vec<f32>,
    pub label: usize,
}

/// Random-access collection of same-shaped images
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (channels, height, width) of every item
    fn item_shape(&self) -> [usize; 3];

    fn get(&self, index: usize) -> Result<Sample>;
}

/// Dataset backed by decoded images in memory
pub struct InMemoryDataset {
    shape: [usize; 3],
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    /// # Panics
    /// If any image does not have `shape.iter().product()` values
    pub fn new(shape: [usize; 3], samples: Vec<Sample>) -> Self {
        let size: usize = shape.iter().product();
        assert!(
            samples.iter().all(|s| s.image.len() == size),
            "every image must have shape {shape:?}"
        );
        InMemoryDataset { shape, samples }
    }

    /// `count` images of a single value, labelled 0
    pub fn constant(count: usize, shape: [usize; 3], value: f32) -> Self {
        let size = shape.iter().product();
        let samples = (0..count)
            .map(|_| Sample {
                image: vec![value; size],
                label: 0,
            })
            .collect();
        Self::new(shape, samples)
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn item_shape(&self) -> [usize; 3] {
        self.shape
    }

    fn get(&self, index: usize) -> Result<Sample> {
        Ok(self.samples[index].clone())
    }
}

/// A batch of images `(B, C, H, W)` and their labels `(B)`
pub struct Batch {
    pub images: Tensor,
    pub labels: Tensor,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.images.borrow().shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finite, restartable batch iterator over a dataset
///
/// Each call to `epoch` reshuffles (when enabled) and yields
/// `ceil(len / batch_size)` batches; the last one may be smaller.
pub struct DataLoader<D: Dataset> {
    dataset: D,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
    order: Vec<usize>,
}

impl<D: Dataset> DataLoader<D> {
    /// # Panics
    /// If `batch_size` is zero
    pub fn new(dataset: D, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        let order = (0..dataset.len()).collect();
        DataLoader {
            dataset,
            batch_size,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
            order,
        }
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches per epoch
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Start a new pass over the data
    pub fn epoch(&mut self) -> Batches<'_, D> {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        Batches {
            loader: self,
            cursor: 0,
        }
    }

    fn collate(&self, indices: &[usize]) -> Result<Batch> {
        let [c, h, w] = self.dataset.item_shape();
        let mut images = Vec::with_capacity(indices.len() * c * h * w);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            let sample = self.dataset.get(i)?;
            images.extend(sample.image);
            labels.push(sample.label as f32);
        }
        Ok(Batch {
            images: RawTensor::new(images, &[indices.len(), c, h, w], false),
            labels: RawTensor::new(labels, &[indices.len()], false),
        })
    }
}

/// Batches of one epoch, see `DataLoader::epoch`
pub struct Batches<'a, D: Dataset> {
    loader: &'a DataLoader<D>,
    cursor: usize,
}

impl<D: Dataset> Iterator for Batches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let order = &self.loader.order;
        if self.cursor >= order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(order.len());
        let batch = self.loader.collate(&order[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.loader.order.len() - self.cursor).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorOps;

    fn numbered(count: usize) -> InMemoryDataset {
        let samples = (0..count)
            .map(|i| Sample {
                image: vec![i as f32; 4],
                label: i,
            })
            .collect();
        InMemoryDataset::new([1, 2, 2], samples)
    }

    #[test]
    fn test_keeps_partial_last_batch() {
        let mut loader = DataLoader::new(numbered(10), 4, false, 0);
        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = loader.epoch().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_batch_layout() {
        let mut loader = DataLoader::new(numbered(3), 2, false, 0);
        let batch = loader.epoch().next().unwrap().unwrap();
        assert_eq!(batch.images.shape(), vec![2, 1, 2, 2]);
        assert_eq!(batch.images.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(batch.labels.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_shuffle_visits_every_item_once_per_epoch() {
        let mut loader = DataLoader::new(numbered(9), 4, true, 42);
        let mut epochs = Vec::new();
        for _ in 0..2 {
            let mut labels: Vec<usize> = loader
                .epoch()
                .flat_map(|b| b.unwrap().labels.to_vec())
                .map(|l| l as usize)
                .collect();
            epochs.push(labels.clone());
            labels.sort_unstable();
            assert_eq!(labels, (0..9).collect::<Vec<_>>());
        }
        // different order each epoch
        assert_ne!(epochs[0], epochs[1]);
    }
}
