use crate::data::{Dataset, Sample};
use crate::error::{FaceGanError, Result};
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Images laid out as `root/<class>/<file>`, decoded lazily
///
/// Classes are the sorted subdirectory names; their index is the label.
/// Images nested deeper inside a class directory belong to that class. A
/// root without subdirectories is treated as a single class.
pub struct ImageFolder {
    root: PathBuf,
    image_size: usize,
    classes: Vec<String>,
    samples: Vec<(PathBuf, usize)>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Every image under `dir`, nested subdirectories included, in sorted path order
fn collect_images(dir: &Path, images: &mut Vec<PathBuf>) -> Result<()> {
    for path in sorted_entries(dir)? {
        if path.is_dir() {
            collect_images(&path, images)?;
        } else if is_image(&path) {
            images.push(path);
        }
    }
    Ok(())
}

impl ImageFolder {
    /// Index every image under `root`; decoding happens in `get`
    pub fn open<P: AsRef<Path>>(root: P, image_size: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = sorted_entries(&root)?;
        let class_dirs: Vec<PathBuf> = entries.iter().filter(|p| p.is_dir()).cloned().collect();

        let mut classes = Vec::new();
        let mut samples = Vec::new();
        if class_dirs.is_empty() {
            classes.push(String::new());
            samples.extend(entries.into_iter().filter(|p| is_image(p)).map(|p| (p, 0)));
        } else {
            for dir in class_dirs {
                let label = classes.len();
                classes.push(dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
                let mut files = Vec::new();
                collect_images(&dir, &mut files)?;
                let before = samples.len();
                samples.extend(files.into_iter().map(|p| (p, label)));
                debug!(class = %dir.display(), images = samples.len() - before, "indexed class");
            }
        }

        if samples.is_empty() {
            return Err(FaceGanError::EmptyDataset(root));
        }
        info!(
            root = %root.display(),
            images = samples.len(),
            classes = classes.len(),
            "opened image folder"
        );
        Ok(ImageFolder {
            root,
            image_size,
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Decode one image into CHW floats in [0, 1], resized to `image_size`²
    fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path).map_err(|source| FaceGanError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let size = self.image_size as u32;
        let rgb = if img.width() == size && img.height() == size {
            img.to_rgb8()
        } else {
            img.resize_to_fill(size, size, FilterType::Triangle).to_rgb8()
        };

        // Push normalized pixel data in CHW order.
        let mut data = Vec::with_capacity(3 * self.image_size * self.image_size);
        for c in 0..3 {
            data.extend(rgb.pixels().map(|p| p[c] as f32 / 255.0));
        }
        Ok(data)
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn item_shape(&self) -> [usize; 3] {
        [3, self.image_size, self.image_size]
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let (path, label) = &self.samples[index];
        Ok(Sample {
            image: self.load(path)?,
            label: *label,
        })
    }
}
