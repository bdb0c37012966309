use std::path::{Path, PathBuf};

use burn::prelude::*;
use thiserror::Error;

use crate::model::UNetConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to load configuration from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Image size must be non-zero, got {0:?}")]
    ZeroImageSize([usize; 2]),

    #[error("Image size {size:?} must be a multiple of {factor} for this model depth")]
    IndivisibleImageSize { size: [usize; 2], factor: usize },

    #[error("Model depth {depth} halves the image more times than {size:?} allows")]
    Depth { depth: usize, size: [usize; 2] },
}

/// Settings for one evaluation run.
///
/// Built once at startup (from JSON or command-line flags) and handed to each
/// collaborator explicitly.
#[derive(Config, Debug)]
pub struct EvalConfig {
    /// Directory searched for the latest checkpoint.
    pub checkpoint_dir: PathBuf,
    /// CSV file with `name,r,g,b` per class.
    pub classes_path: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    /// `[height, width]` every image and label is resized to.
    #[config(default = "[256, 256]")]
    pub image_size: [usize; 2],
    #[config(default = 8)]
    pub batch_size: usize,
    #[config(default = "String::from(\"mpk\")")]
    pub checkpoint_extension: String,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = "UNetConfig::new()")]
    pub model: UNetConfig,
}

impl EvalConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        <Self as Config>::load(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        if self.image_size.contains(&0) {
            return Err(ConfigError::ZeroImageSize(self.image_size));
        }

        let smallest = self.image_size.iter().copied().min().unwrap_or_default();
        let factor = match self.model.size_factor() {
            Some(factor) if factor <= smallest => factor,
            _ => {
                return Err(ConfigError::Depth {
                    depth: self.model.depth,
                    size: self.image_size,
                });
            }
        };

        if self.image_size.iter().any(|side| side % factor != 0) {
            return Err(ConfigError::IndivisibleImageSize {
                size: self.image_size,
                factor,
            });
        }

        Ok(())
    }

    /// Model configuration with the class count taken from the classes file.
    pub fn unet_config(&self, num_classes: usize) -> UNetConfig {
        self.model.clone().with_num_classes(num_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EvalConfig {
        EvalConfig::new(
            "model_data".into(),
            "classes.csv".into(),
            "val/images".into(),
            "val/labels".into(),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let config = config();

        assert_eq!(config.batch_size, 8);
        assert_eq!(config.checkpoint_extension, "mpk");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_sizes() {
        assert!(matches!(
            config().with_batch_size(0).validate(),
            Err(ConfigError::ZeroBatchSize)
        ));
        assert!(matches!(
            config().with_image_size([0, 256]).validate(),
            Err(ConfigError::ZeroImageSize(_))
        ));
        assert!(matches!(
            config().with_image_size([250, 256]).validate(),
            Err(ConfigError::IndivisibleImageSize { factor: 16, .. })
        ));
    }

    #[test]
    fn rejects_depth_beyond_image() {
        let mut config = config();
        config.model.depth = 64;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Depth { depth: 64, .. })
        ));

        let config = config.with_image_size([8, 16]);
        let mut deep = config.clone();
        deep.model.depth = 4;
        assert!(matches!(deep.validate(), Err(ConfigError::Depth { depth: 4, .. })));

        let mut shallow = config;
        shallow.model.depth = 3;
        assert!(shallow.validate().is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.json");

        let config = config().with_image_size([64, 128]).with_seed(7);
        config.save(&path).unwrap();

        let loaded = EvalConfig::from_file(&path).unwrap();
        assert_eq!(loaded.image_size, [64, 128]);
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.model.depth, 4);

        let err = EvalConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn model_takes_class_count() {
        assert_eq!(config().unet_config(19).num_classes, 19);
    }
}
