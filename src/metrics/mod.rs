mod confusion;
mod iou;
mod mean_iou;

pub use confusion::ConfusionMatrix;
pub use iou::{ClassIoU, finalize};
pub use mean_iou::{MeanIoU, MeanIoUReport, argmax_labels, labels_to_vec};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Shape mismatch: targets {targets:?} vs predictions {predictions:?}")]
    ShapeMismatch {
        targets: Vec<usize>,
        predictions: Vec<usize>,
    },

    #[error("Class count mismatch: expected {expected}, got {actual}")]
    ClassCount { expected: usize, actual: usize },

    #[error("Label {label} is outside the valid range 0..{num_classes}")]
    LabelOutOfRange { label: i64, num_classes: usize },

    #[error("Label {0} is negative")]
    NegativeLabel(i64),

    #[error("No batches to evaluate")]
    Empty,

    #[error("No class had a non-empty union in any batch")]
    Undefined,

    #[error("Unable to read tensor data: {0}")]
    TensorData(String),
}
