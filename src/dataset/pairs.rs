use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::DatasetError;

pub const SUPPORTED_FILES: [&str; 6] = ["png", "bmp", "jpg", "jpeg", "tif", "tiff"];

pub(crate) fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_FILES
                .iter()
                .any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext))
        })
}

/// Pair every image in `images_dir` with the label in `labels_dir` sharing its
/// file stem. Images without a label are skipped. Pairs are sorted by image
/// path so batch contents are stable between runs.
pub fn image_label_pairs<P: AsRef<Path>>(
    images_dir: P,
    labels_dir: P,
) -> Result<Vec<(PathBuf, PathBuf)>, DatasetError> {
    let images_dir = images_dir.as_ref();
    let labels_dir = labels_dir.as_ref();

    for dir in [images_dir, labels_dir] {
        if !dir.is_dir() {
            return Err(DatasetError::MissingDirectory(dir.to_path_buf()));
        }
    }

    let io_error = |source| DatasetError::Io {
        path: images_dir.to_path_buf(),
        source,
    };

    let mut pairs = Vec::new();
    for entry in std::fs::read_dir(images_dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if !path.is_file() || !is_supported(&path) {
            continue;
        }

        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let label = SUPPORTED_FILES
            .iter()
            .map(|ext| labels_dir.join(format!("{stem}.{ext}")))
            .find(|candidate| candidate.is_file());

        match label {
            Some(label) => pairs.push((path, label)),
            None => warn!(image = %path.display(), "no label found, skipping"),
        }
    }

    if pairs.is_empty() {
        return Err(DatasetError::NoPairs {
            images: images_dir.to_path_buf(),
            labels: labels_dir.to_path_buf(),
        });
    }

    pairs.sort();
    debug!(count = pairs.len(), "paired images with labels");

    Ok(pairs)
}
