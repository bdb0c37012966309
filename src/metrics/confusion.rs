use super::{ClassIoU, MetricError};

/// Pixel counts indexed by `(ground truth, prediction)`.
///
/// Row `t` holds every pixel whose true class is `t`, so the diagonal is the
/// per-class intersection and `row + column - diagonal` is the union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    pub fn from_labels(
        num_classes: usize,
        targets: &[usize],
        predictions: &[usize],
    ) -> Result<Self, MetricError> {
        let mut matrix = Self::new(num_classes);
        matrix.add_labels(targets, predictions)?;
        Ok(matrix)
    }

    /// Count every `(target, prediction)` pixel pair.
    pub fn add_labels(&mut self, targets: &[usize], predictions: &[usize]) -> Result<(), MetricError> {
        if targets.len() != predictions.len() {
            return Err(MetricError::ShapeMismatch {
                targets: vec![targets.len()],
                predictions: vec![predictions.len()],
            });
        }

        for (&target, &prediction) in targets.iter().zip(predictions) {
            let target = self.check_label(target)?;
            let prediction = self.check_label(prediction)?;
            let cell = target * self.num_classes + prediction;
            self.counts[cell] += 1;
        }

        Ok(())
    }

    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<(), MetricError> {
        if other.num_classes != self.num_classes {
            return Err(MetricError::ClassCount {
                expected: self.num_classes,
                actual: other.num_classes,
            });
        }

        for (count, other) in self.counts.iter_mut().zip(&other.counts) {
            *count += other;
        }

        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Pixels of true class `target` predicted as `prediction`, `None` when
    /// either class is out of range.
    pub fn get(&self, target: usize, prediction: usize) -> Option<u64> {
        if target >= self.num_classes || prediction >= self.num_classes {
            return None;
        }

        Some(self.count(target, prediction))
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn intersection(&self, class: usize) -> Option<u64> {
        self.get(class, class)
    }

    pub fn union(&self, class: usize) -> Option<u64> {
        let intersection = self.intersection(class)?;
        let row: u64 = (0..self.num_classes).map(|p| self.count(class, p)).sum();
        let column: u64 = (0..self.num_classes).map(|t| self.count(t, class)).sum();

        Some(row + column - intersection)
    }

    /// `None` when the class appears in neither ground truth nor prediction,
    /// or is out of range.
    pub fn class_iou(&self, class: usize) -> Option<f64> {
        let union = self.union(class)?;
        if union == 0 {
            return None;
        }

        Some(self.count(class, class) as f64 / union as f64)
    }

    pub fn iou(&self) -> ClassIoU {
        (0..self.num_classes)
            .map(|class| self.class_iou(class))
            .collect::<Vec<_>>()
            .into()
    }

    pub fn pixel_accuracy(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }

        let correct: u64 = (0..self.num_classes).map(|c| self.count(c, c)).sum();
        Some(correct as f64 / total as f64)
    }

    fn count(&self, target: usize, prediction: usize) -> u64 {
        self.counts[target * self.num_classes + prediction]
    }

    fn check_label(&self, label: usize) -> Result<usize, MetricError> {
        if label < self.num_classes {
            Ok(label)
        } else {
            Err(MetricError::LabelOutOfRange {
                label: label as i64,
                num_classes: self.num_classes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_pairs_by_target_row() {
        let matrix = ConfusionMatrix::from_labels(3, &[0, 0, 1, 2], &[0, 1, 1, 1]).unwrap();

        assert_eq!(matrix.get(0, 0), Some(1));
        assert_eq!(matrix.get(0, 1), Some(1));
        assert_eq!(matrix.get(1, 1), Some(1));
        assert_eq!(matrix.get(2, 1), Some(1));
        assert_eq!(matrix.total(), 4);
    }

    #[test]
    fn union_and_intersection() {
        let matrix = ConfusionMatrix::from_labels(3, &[0, 0, 1, 2], &[0, 1, 1, 1]).unwrap();

        assert_eq!(matrix.intersection(1), Some(1));
        assert_eq!(matrix.union(1), Some(3));
        assert_eq!(matrix.class_iou(0), Some(0.5));
        assert_eq!(matrix.class_iou(2), Some(0.0));
        assert_eq!(matrix.pixel_accuracy(), Some(0.5));
    }

    #[test]
    fn out_of_range_classes_have_no_counts() {
        let matrix = ConfusionMatrix::from_labels(2, &[0, 1], &[1, 1]).unwrap();

        assert_eq!(matrix.get(2, 0), None);
        assert_eq!(matrix.get(0, 2), None);
        assert_eq!(matrix.intersection(5), None);
        assert_eq!(matrix.union(5), None);
        assert_eq!(matrix.class_iou(5), None);
    }

    #[test]
    fn absent_class_is_undefined() {
        let matrix = ConfusionMatrix::from_labels(3, &[0, 0], &[0, 0]).unwrap();

        assert_eq!(matrix.class_iou(0), Some(1.0));
        assert_eq!(matrix.class_iou(1), None);
        assert_eq!(matrix.class_iou(2), None);
    }

    #[test]
    fn merge_adds_counts() {
        let mut matrix = ConfusionMatrix::from_labels(2, &[0, 1], &[0, 0]).unwrap();
        let other = ConfusionMatrix::from_labels(2, &[1, 1], &[1, 1]).unwrap();

        matrix.merge(&other).unwrap();

        assert_eq!(matrix.get(1, 1), Some(2));
        assert_eq!(matrix.get(1, 0), Some(1));
        assert_eq!(matrix.total(), 4);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let err = ConfusionMatrix::from_labels(2, &[0, 1], &[0]).unwrap_err();
        assert!(matches!(err, MetricError::ShapeMismatch { .. }));

        let err = ConfusionMatrix::from_labels(2, &[0, 2], &[0, 1]).unwrap_err();
        assert_eq!(
            err,
            MetricError::LabelOutOfRange {
                label: 2,
                num_classes: 2
            }
        );

        let mut matrix = ConfusionMatrix::new(2);
        let err = matrix.merge(&ConfusionMatrix::new(3)).unwrap_err();
        assert!(matches!(err, MetricError::ClassCount { .. }));
    }
}
