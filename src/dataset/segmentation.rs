use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use derive_new::new;
use image::imageops::FilterType;
use tracing::warn;

use super::{DatasetError, pairs::is_supported};
use crate::classes::ClassInfo;

/// Paths of one image and its colour-coded label.
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct SegmentationItemRaw {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

/// A decoded sample, resized to the dataset's image size.
#[derive(new, Clone, Debug)]
pub struct SegmentationItem {
    /// Interleaved RGB, row-major, `height * width * 3` values.
    pub image: Vec<u8>,
    /// Class index per pixel, row-major, `height * width` values.
    pub label: Vec<usize>,
}

/// Image/label pairs decoded lazily on access.
#[derive(Clone, Debug)]
pub struct SegmentationDataset {
    items: Vec<SegmentationItemRaw>,
    classes: ClassInfo,
    image_size: [usize; 2],
}

impl SegmentationDataset {
    /// # Arguments
    ///
    /// * `pairs` - (image path, label path) for every sample.
    /// * `classes` - colour table used to turn label pixels into class indices.
    /// * `image_size` - `[height, width]` every sample is resized to.
    pub fn new<P: AsRef<Path>>(
        pairs: Vec<(P, P)>,
        classes: ClassInfo,
        image_size: [usize; 2],
    ) -> Result<Self, DatasetError> {
        let items = pairs
            .into_iter()
            .map(|(image, label)| {
                for path in [image.as_ref(), label.as_ref()] {
                    if !is_supported(path) {
                        return Err(DatasetError::InvalidFileExtension(
                            path.display().to_string(),
                        ));
                    }
                }

                Ok(SegmentationItemRaw::new(
                    image.as_ref().to_path_buf(),
                    label.as_ref().to_path_buf(),
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            items,
            classes,
            image_size,
        })
    }

    pub fn classes(&self) -> &ClassInfo {
        &self.classes
    }

    pub fn image_size(&self) -> [usize; 2] {
        self.image_size
    }

    /// Decode and resize the sample at `index`.
    pub fn load(&self, index: usize) -> Result<SegmentationItem, DatasetError> {
        let raw = self.items.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })?;
        let [height, width] = self.image_size;

        let image = open_resized(&raw.image_path, [height, width], FilterType::Triangle)?;
        let label = open_resized(&raw.label_path, [height, width], FilterType::Nearest)?
            .chunks_exact(3)
            .map(|px| self.classes.class_of_color([px[0], px[1], px[2]]))
            .collect();

        Ok(SegmentationItem::new(image, label))
    }
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    /// A sample that fails to decode is logged at `warn` and returned as
    /// `None`. Use [load](SegmentationDataset::load) to get the error.
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        if index >= self.items.len() {
            return None;
        }

        match self.load(index) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(index, %err, "unable to load segmentation item");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

fn open_resized(
    path: &Path,
    [height, width]: [usize; 2],
    filter: FilterType,
) -> Result<Vec<u8>, DatasetError> {
    let image = image::open(path).map_err(|source| DatasetError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let image = if image.width() as usize == width && image.height() as usize == height {
        image
    } else {
        image.resize_exact(width as u32, height as u32, filter)
    };

    Ok(image.into_rgb8().into_raw())
}
