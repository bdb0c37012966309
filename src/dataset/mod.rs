mod batcher;
mod pairs;
mod segmentation;

pub use batcher::{SegmentationBatch, SegmentationBatcher, SegmentationLoader};
pub use pairs::{SUPPORTED_FILES, image_label_pairs};
pub use segmentation::{SegmentationDataset, SegmentationItem, SegmentationItemRaw};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Invalid file extension: `{0}`")]
    InvalidFileExtension(String),

    #[error("No image/label pairs found in {images:?} and {labels:?}")]
    NoPairs { images: PathBuf, labels: PathBuf },

    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,
}
