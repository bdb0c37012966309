use std::path::{Path, PathBuf};

use burn::prelude::*;
use image::RgbImage;
use thiserror::Error;

use crate::metrics::{MetricError, argmax_labels};
use crate::model::SegmentationModel;

#[derive(Error, Debug)]
pub enum VisualizeError {
    #[error("Label {label} has no colour ({num_classes} classes)")]
    UnknownClass { label: usize, num_classes: usize },

    #[error("Expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("Unable to write {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Unable to create {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run the model on a single `[3, H, W]` image and return its `[H, W]`
/// class-index map.
pub fn predict_label_map<B: Backend, M: SegmentationModel<B>>(
    model: &M,
    image: Tensor<B, 3>,
) -> Tensor<B, 2, Int> {
    let probabilities = model.predict(image.unsqueeze::<4>());

    argmax_labels(probabilities).squeeze::<2>(0)
}

/// Paint every pixel with the colour of its class.
pub fn color_mask(
    labels: &[usize],
    [height, width]: [usize; 2],
    colors: &[[u8; 3]],
) -> Result<RgbImage, VisualizeError> {
    if labels.len() != height * width {
        return Err(VisualizeError::SizeMismatch {
            expected: height * width,
            actual: labels.len(),
        });
    }

    let mut raw = Vec::with_capacity(labels.len() * 3);
    for &label in labels {
        let color = colors.get(label).ok_or(VisualizeError::UnknownClass {
            label,
            num_classes: colors.len(),
        })?;
        raw.extend_from_slice(color);
    }

    image_from_raw(raw, [height, width])
}

/// Convert a `[3, H, W]` tensor with values in `[0, 1]` to an RGB image.
pub fn image_from_tensor<B: Backend>(image: Tensor<B, 3>) -> Result<RgbImage, VisualizeError> {
    let [_, height, width] = image.dims();
    let plane = height * width;

    let values = image
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| MetricError::TensorData(format!("{e:?}")))?;

    let mut raw = Vec::with_capacity(plane * 3);
    for pixel in 0..plane {
        for c in 0..3 {
            let value = values.get(c * plane + pixel).copied().unwrap_or(0.0);
            raw.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }

    image_from_raw(raw, [height, width])
}

fn image_from_raw(raw: Vec<u8>, [height, width]: [usize; 2]) -> Result<RgbImage, VisualizeError> {
    let actual = raw.len();

    RgbImage::from_raw(width as u32, height as u32, raw).ok_or(VisualizeError::SizeMismatch {
        expected: height * width * 3,
        actual,
    })
}

/// An input image next to its ground-truth and predicted masks.
#[derive(Clone, Debug)]
pub struct Prediction {
    pub input: RgbImage,
    pub ground_truth: RgbImage,
    pub prediction: RgbImage,
}

impl Prediction {
    pub fn from_labels(
        input: RgbImage,
        ground_truth: &[usize],
        predicted: &[usize],
        colors: &[[u8; 3]],
    ) -> Result<Self, VisualizeError> {
        let size = [input.height() as usize, input.width() as usize];

        Ok(Self {
            ground_truth: color_mask(ground_truth, size, colors)?,
            prediction: color_mask(predicted, size, colors)?,
            input,
        })
    }

    /// Write `input.png`, `ground_truth.png` and `prediction.png` to `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>, VisualizeError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| VisualizeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        [
            ("input.png", &self.input),
            ("ground_truth.png", &self.ground_truth),
            ("prediction.png", &self.prediction),
        ]
        .into_iter()
        .map(|(name, image)| -> Result<PathBuf, VisualizeError> {
            let path = dir.join(name);
            image.save(&path).map_err(|source| VisualizeError::Image {
                path: path.clone(),
                source,
            })?;
            Ok(path)
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::labels_to_vec;
    use burn::backend::NdArray;
    use image::Rgb;

    type TestBackend = NdArray<f32>;

    const COLORS: [[u8; 3]; 2] = [[0, 0, 0], [128, 64, 128]];

    struct Fixed {
        output: Tensor<TestBackend, 4>,
    }

    impl SegmentationModel<TestBackend> for Fixed {
        fn num_classes(&self) -> usize {
            self.output.dims()[1]
        }

        fn predict(&self, _images: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 4> {
            self.output.clone()
        }
    }

    #[test]
    fn colours_each_class() {
        let mask = color_mask(&[0, 1, 1, 0], [2, 2], &COLORS).unwrap();

        assert_eq!(mask.dimensions(), (2, 2));
        assert_eq!(*mask.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*mask.get_pixel(1, 0), Rgb([128, 64, 128]));
        assert_eq!(*mask.get_pixel(0, 1), Rgb([128, 64, 128]));
    }

    #[test]
    fn colour_mask_rejects_bad_input() {
        assert!(matches!(
            color_mask(&[0, 2], [1, 2], &COLORS),
            Err(VisualizeError::UnknownClass { label: 2, .. })
        ));
        assert!(matches!(
            color_mask(&[0], [1, 2], &COLORS),
            Err(VisualizeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn predicts_label_map_by_argmax() {
        let device = Default::default();
        let model = Fixed {
            output: Tensor::from_data(
                TensorData::new(vec![0.7f32, 0.1, 0.3, 0.9], [1, 2, 1, 2]),
                &device,
            ),
        };

        let labels = predict_label_map(&model, Tensor::zeros([3, 1, 2], &device));

        assert_eq!(labels.dims(), [1, 2]);
        assert_eq!(labels_to_vec(labels).unwrap(), vec![0, 1]);
    }

    #[test]
    fn tensor_to_image() {
        let image = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0, 0.5, 2.0], [3, 1, 2]),
            &Default::default(),
        );

        let image = image_from_tensor(image).unwrap();

        assert_eq!(*image.get_pixel(0, 0), Rgb([255, 0, 128]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([0, 255, 255]));
    }

    #[test]
    fn saves_three_images() {
        let dir = tempfile::tempdir().unwrap();
        let input = RgbImage::from_pixel(2, 1, Rgb([9, 9, 9]));

        let prediction = Prediction::from_labels(input, &[0, 1], &[1, 1], &COLORS).unwrap();
        let paths = prediction.save(dir.path().join("out")).unwrap();

        assert_eq!(paths.len(), 3);
        for path in paths {
            assert!(path.is_file());
        }
        assert_eq!(*prediction.prediction.get_pixel(0, 0), Rgb([128, 64, 128]));
    }
}
