use std::path::{Path, PathBuf};

use burn::{prelude::*, record::CompactRecorder};
use thiserror::Error;
use tracing::info;

use crate::model::{UNet, UNetConfig};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("No `.{extension}` checkpoint found in {dir:?}")]
    NotFound { dir: PathBuf, extension: String },

    #[error("Unable to read checkpoint directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to load checkpoint {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// The lexicographically last file in `dir` with the given extension.
///
/// Checkpoints named by epoch or timestamp with fixed-width numbers sort in
/// training order.
pub fn latest_checkpoint<P: AsRef<Path>>(dir: P, extension: &str) -> Result<PathBuf, CheckpointError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(CheckpointError::MissingDirectory(dir.to_path_buf()));
    }

    let io_error = |source| CheckpointError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut latest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();

        let matches = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

        if matches && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    latest.ok_or_else(|| CheckpointError::NotFound {
        dir: dir.to_path_buf(),
        extension: extension.to_string(),
    })
}

/// Name of the directory holding the checkpoint, used to identify the model
/// under evaluation.
pub fn model_name<P: AsRef<Path>>(checkpoint: P) -> String {
    checkpoint
        .as_ref()
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn load_unet<B: Backend>(
    path: &Path,
    config: &UNetConfig,
    device: &B::Device,
) -> Result<UNet<B>, CheckpointError> {
    info!(path = %path.display(), "loading model weights");

    config
        .init::<B>(device)
        .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| CheckpointError::Load {
            path: path.to_path_buf(),
            reason: format!("{e:?}"),
        })
}
