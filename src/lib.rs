pub mod checkpoint;
pub mod classes;
pub mod config;
pub mod metrics;
pub mod model;
pub mod visualize;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "dataset")]
pub mod evaluate;

pub use classes::ClassInfo;
pub use config::EvalConfig;
pub use metrics::{ClassIoU, MeanIoU, MeanIoUReport};
pub use model::{SegmentationModel, UNet, UNetConfig};

#[cfg(feature = "dataset")]
pub use dataset::{SegmentationDataset, SegmentationLoader};

#[cfg(feature = "dataset")]
pub use evaluate::{EvalError, RunSummary};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
