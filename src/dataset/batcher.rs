use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use super::{DatasetError, SegmentationDataset, SegmentationItem};

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// `[batch, 3, height, width]`, values in `[0, 1]`.
    pub images: Tensor<B, 4>,
    /// One-hot `[batch, classes, height, width]`.
    pub labels: Tensor<B, 4>,
}

#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
    num_classes: usize,
    image_size: [usize; 2],
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device, num_classes: usize, image_size: [usize; 2]) -> Self {
        Self {
            device,
            num_classes,
            image_size,
        }
    }
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let batch_size = items.len();
        let [height, width] = self.image_size;
        let plane = height * width;

        let mut image_data = Vec::with_capacity(batch_size * 3 * plane);
        let mut label_data = vec![0.0f32; batch_size * self.num_classes * plane];

        for (index, item) in items.iter().enumerate() {
            for c in 0..3 {
                for pixel in 0..plane {
                    let value = item.image.get(pixel * 3 + c).copied().unwrap_or(0);
                    image_data.push(value as f32 / 255.0);
                }
            }

            for (pixel, &class) in item.label.iter().take(plane).enumerate() {
                if class < self.num_classes {
                    label_data[(index * self.num_classes + class) * plane + pixel] = 1.0;
                }
            }
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(image_data, [batch_size, 3, height, width]).convert::<B::FloatElem>(),
            &self.device,
        );
        let labels = Tensor::<B, 4>::from_data(
            TensorData::new(label_data, [batch_size, self.num_classes, height, width])
                .convert::<B::FloatElem>(),
            &self.device,
        );

        SegmentationBatch { images, labels }
    }
}

/// Indexable batches over a [SegmentationDataset].
///
/// The last batch holds the remainder and may be shorter than `batch_size`.
pub struct SegmentationLoader<B: Backend> {
    dataset: SegmentationDataset,
    batcher: SegmentationBatcher<B>,
    batch_size: usize,
}

impl<B: Backend> SegmentationLoader<B> {
    pub fn new(
        dataset: SegmentationDataset,
        device: B::Device,
        batch_size: usize,
    ) -> Result<Self, DatasetError> {
        if batch_size == 0 {
            return Err(DatasetError::ZeroBatchSize);
        }

        let batcher = SegmentationBatcher::new(
            device,
            dataset.classes().num_classes(),
            dataset.image_size(),
        );

        Ok(Self {
            dataset,
            batcher,
            batch_size,
        })
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &SegmentationDataset {
        &self.dataset
    }

    /// Number of samples in batch `index`.
    pub fn batch_len(&self, index: usize) -> Result<usize, DatasetError> {
        let range = self.range(index)?;
        Ok(range.len())
    }

    pub fn get(&self, index: usize) -> Result<SegmentationBatch<B>, DatasetError> {
        let items = self
            .range(index)?
            .map(|i| self.dataset.load(i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.batcher.batch(items))
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<SegmentationBatch<B>, DatasetError>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }

    fn range(&self, index: usize) -> Result<std::ops::Range<usize>, DatasetError> {
        if index >= self.len() {
            return Err(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.dataset.len());
        Ok(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassInfo;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn classes() -> ClassInfo {
        ClassInfo::from_entries([
            ("background", [0, 0, 0]),
            ("road", [128, 64, 128]),
            ("car", [0, 0, 142]),
        ])
        .unwrap()
    }

    #[test]
    fn batches_channels_first_with_one_hot_labels() {
        let batcher = SegmentationBatcher::<TestBackend>::new(Default::default(), 3, [1, 2]);
        let item = SegmentationItem::new(vec![255, 0, 51, 0, 255, 102], vec![2, 0]);

        let batch = batcher.batch(vec![item]);

        assert_eq!(batch.images.dims(), [1, 3, 1, 2]);
        assert_eq!(batch.labels.dims(), [1, 3, 1, 2]);

        let images = batch.images.into_data().to_vec::<f32>().unwrap();
        assert_eq!(images, vec![1.0, 0.0, 0.0, 1.0, 0.2, 0.4]);

        let labels = batch.labels.into_data().to_vec::<f32>().unwrap();
        assert_eq!(labels, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    fn write_samples(dir: &std::path::Path, count: usize) -> Vec<(std::path::PathBuf, std::path::PathBuf)> {
        (0..count)
            .map(|i| {
                let image = dir.join(format!("{i}.png"));
                let label = dir.join(format!("{i}_label.png"));
                RgbImage::from_pixel(4, 4, Rgb([i as u8, 0, 0])).save(&image).unwrap();
                RgbImage::from_pixel(4, 4, Rgb([0, 0, 142])).save(&label).unwrap();
                (image, label)
            })
            .collect()
    }

    #[test]
    fn loader_splits_into_batches() {
        let dir = tempfile::tempdir().unwrap();
        let dataset =
            SegmentationDataset::new(write_samples(dir.path(), 5), classes(), [4, 4]).unwrap();
        let loader = SegmentationLoader::<TestBackend>::new(dataset, Default::default(), 2).unwrap();

        assert_eq!(loader.len(), 3);
        assert_eq!(loader.batch_size(), 2);
        assert_eq!(loader.batch_len(2).unwrap(), 1);

        let last = loader.get(2).unwrap();
        assert_eq!(last.images.dims(), [1, 3, 4, 4]);
        assert_eq!(last.labels.dims(), [1, 3, 4, 4]);

        assert_eq!(loader.iter().filter(|b| b.is_ok()).count(), 3);
        assert!(matches!(
            loader.get(3),
            Err(DatasetError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn loader_rejects_zero_batch_size() {
        let dataset = SegmentationDataset::new(Vec::<(&str, &str)>::new(), classes(), [4, 4]).unwrap();

        assert!(matches!(
            SegmentationLoader::<TestBackend>::new(dataset, Default::default(), 0),
            Err(DatasetError::ZeroBatchSize)
        ));
    }
}
