use burn::prelude::*;
use serde::Serialize;

use super::{ClassIoU, ConfusionMatrix, MetricError, finalize};

/// Reduce class probabilities `[batch, classes, height, width]` to hard
/// labels `[batch, height, width]`.
pub fn argmax_labels<B: Backend>(probabilities: Tensor<B, 4>) -> Tensor<B, 3, Int> {
    probabilities.argmax(1).squeeze::<3>(1)
}

/// Copy an integer label tensor to the host in row-major order.
pub fn labels_to_vec<B: Backend, const D: usize>(
    labels: Tensor<B, D, Int>,
) -> Result<Vec<usize>, MetricError> {
    let values = labels
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| MetricError::TensorData(format!("{e:?}")))?;

    values
        .into_iter()
        .map(|label| usize::try_from(label).map_err(|_| MetricError::NegativeLabel(label)))
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct MeanIoUReport {
    /// Mean of the defined per-class averages.
    pub overall: f64,
    /// Per-class IoU averaged over the batches where the class was defined.
    pub per_class: ClassIoU,
    /// Per-class IoU computed from the confusion matrix of the whole run.
    pub dataset_per_class: ClassIoU,
    pub dataset_overall: Option<f64>,
    pub pixel_accuracy: Option<f64>,
    pub batches: usize,
}

/// Running mean-IoU over a sequence of batches.
///
/// Every call to [update](MeanIoU::update) records the batch's per-class IoU
/// and folds its pixel counts into a confusion matrix for the whole run.
#[derive(Clone, Debug)]
pub struct MeanIoU {
    num_classes: usize,
    batches: Vec<ClassIoU>,
    confusion: ConfusionMatrix,
}

impl MeanIoU {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            batches: Vec::new(),
            confusion: ConfusionMatrix::new(num_classes),
        }
    }

    /// Score one batch of one-hot targets against predicted probabilities.
    ///
    /// Both tensors are `[batch, classes, height, width]`.
    pub fn update<B: Backend>(
        &mut self,
        targets: Tensor<B, 4>,
        predictions: Tensor<B, 4>,
    ) -> Result<ClassIoU, MetricError> {
        let target_dims = targets.dims();
        let prediction_dims = predictions.dims();

        if target_dims != prediction_dims {
            return Err(MetricError::ShapeMismatch {
                targets: target_dims.to_vec(),
                predictions: prediction_dims.to_vec(),
            });
        }

        if target_dims[1] != self.num_classes {
            return Err(MetricError::ClassCount {
                expected: self.num_classes,
                actual: target_dims[1],
            });
        }

        let targets = labels_to_vec(argmax_labels(targets))?;
        let predictions = labels_to_vec(argmax_labels(predictions))?;

        self.update_labels(&targets, &predictions)
    }

    /// Score one batch of labels that are already reduced to class indices.
    pub fn update_labels(
        &mut self,
        targets: &[usize],
        predictions: &[usize],
    ) -> Result<ClassIoU, MetricError> {
        let batch = ConfusionMatrix::from_labels(self.num_classes, targets, predictions)?;
        let iou = batch.iou();

        self.confusion.merge(&batch)?;
        self.batches.push(iou.clone());

        Ok(iou)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn batches(&self) -> &[ClassIoU] {
        &self.batches
    }

    pub fn finalize(&self) -> Result<MeanIoUReport, MetricError> {
        let (overall, per_class) = finalize(&self.batches)?;
        let dataset_per_class = self.confusion.iou();

        Ok(MeanIoUReport {
            overall,
            per_class,
            dataset_overall: dataset_per_class.mean(),
            dataset_per_class,
            pixel_accuracy: self.confusion.pixel_accuracy(),
            batches: self.batches.len(),
        })
    }

    pub fn reset(&mut self) {
        self.batches.clear();
        self.confusion = ConfusionMatrix::new(self.num_classes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn one_hot(labels: &[usize], [n, h, w]: [usize; 3], num_classes: usize) -> Tensor<TestBackend, 4> {
        let plane = h * w;
        let mut data = vec![0.0f32; n * num_classes * plane];

        for (pixel, &class) in labels.iter().enumerate() {
            let (image, offset) = (pixel / plane, pixel % plane);
            data[(image * num_classes + class) * plane + offset] = 1.0;
        }

        Tensor::from_data(
            TensorData::new(data, [n, num_classes, h, w]),
            &Default::default(),
        )
    }

    #[test]
    fn argmax_reduces_class_axis() {
        let probabilities = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(
                vec![0.9f32, 0.2, 0.4, 0.1, 0.8, 0.6],
                [1, 2, 1, 3],
            ),
            &Default::default(),
        );

        let labels = labels_to_vec(argmax_labels(probabilities)).unwrap();

        assert_eq!(labels, vec![0, 1, 1]);
    }

    #[test]
    fn negative_labels_are_rejected() {
        let labels = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::new(vec![0i64, -3, 1], [3]),
            &Default::default(),
        );

        assert_eq!(labels_to_vec(labels).unwrap_err(), MetricError::NegativeLabel(-3));
    }

    #[test]
    fn identical_maps_score_one() {
        let labels = [0, 1, 1, 2, 2, 2, 0, 1];
        let mut metric = MeanIoU::new(3);

        let iou = metric
            .update(one_hot(&labels, [2, 2, 2], 3), one_hot(&labels, [2, 2, 2], 3))
            .unwrap();

        assert_eq!(iou.values(), &[Some(1.0), Some(1.0), Some(1.0)]);
    }

    #[test]
    fn all_background_matches() {
        let mut metric = MeanIoU::new(2);

        let iou = metric
            .update(one_hot(&[0; 4], [1, 2, 2], 2), one_hot(&[0; 4], [1, 2, 2], 2))
            .unwrap();

        assert_eq!(iou.get(0), Some(1.0));
        assert_eq!(iou.get(1), None);
    }

    #[test]
    fn disjoint_prediction_scores_zero() {
        let mut metric = MeanIoU::new(2);

        let iou = metric
            .update(one_hot(&[0; 4], [1, 2, 2], 2), one_hot(&[1; 4], [1, 2, 2], 2))
            .unwrap();

        assert_eq!(iou.values(), &[Some(0.0), Some(0.0)]);

        let report = metric.finalize().unwrap();
        assert_eq!(report.overall, 0.0);
        assert_eq!(report.pixel_accuracy, Some(0.0));
    }

    #[test]
    fn values_stay_in_unit_range() {
        let targets = [0, 0, 1, 1, 2, 2, 0, 1, 2];
        let predictions = [0, 1, 1, 2, 2, 0, 0, 0, 2];
        let mut metric = MeanIoU::new(4);

        let iou = metric
            .update(
                one_hot(&targets, [1, 3, 3], 4),
                one_hot(&predictions, [1, 3, 3], 4),
            )
            .unwrap();

        for value in iou.iter().flatten() {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(iou.get(3), None);
    }

    #[test]
    fn report_combines_batches() {
        let mut metric = MeanIoU::new(2);

        metric.update_labels(&[0, 0, 1, 1], &[0, 0, 1, 1]).unwrap();
        metric.update_labels(&[0, 0, 0, 0], &[0, 0, 0, 1]).unwrap();

        let report = metric.finalize().unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(report.per_class.values(), &[Some(0.875), Some(0.5)]);
        assert_eq!(report.overall, 0.6875);
        assert_eq!(report.dataset_per_class.values(), &[Some(5.0 / 6.0), Some(2.0 / 3.0)]);
        assert_eq!(report.pixel_accuracy, Some(7.0 / 8.0));
    }

    #[test]
    fn rejects_bad_shapes() {
        let mut metric = MeanIoU::new(2);

        let err = metric
            .update(one_hot(&[0; 4], [1, 2, 2], 2), one_hot(&[0; 6], [1, 2, 3], 2))
            .unwrap_err();
        assert!(matches!(err, MetricError::ShapeMismatch { .. }));

        let err = metric
            .update(one_hot(&[0; 4], [1, 2, 2], 3), one_hot(&[0; 4], [1, 2, 2], 3))
            .unwrap_err();
        assert_eq!(
            err,
            MetricError::ClassCount {
                expected: 2,
                actual: 3
            }
        );

        assert!(metric.batches().is_empty());
    }

    #[test]
    fn empty_run_cannot_finalize() {
        let mut metric = MeanIoU::new(2);
        assert_eq!(metric.finalize().unwrap_err(), MetricError::Empty);

        metric.update_labels(&[1], &[1]).unwrap();
        metric.reset();
        assert_eq!(metric.finalize().unwrap_err(), MetricError::Empty);
    }
}
