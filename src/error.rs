use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceGanError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("No images found under {0}")]
    EmptyDataset(PathBuf),

    #[error("Failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image: {0}")]
    ImageWrite(#[from] image::ImageError),

    #[error("Epoch {epoch} not in sample history of {available} epochs")]
    MissingEpoch { epoch: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Loss log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FaceGanError>;
