use serde::Serialize;

use super::MetricError;

/// Per-class IoU values, index `i` being class `i`.
///
/// A `None` entry means the class had an empty union (it appeared in neither
/// the ground truth nor the prediction) and carries no information.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassIoU {
    values: Vec<Option<f64>>,
}

impl ClassIoU {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, class: usize) -> Option<f64> {
        self.values.get(class).copied().flatten()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values.iter().copied()
    }

    /// Number of classes with a defined value.
    pub fn defined(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Mean over the defined classes only.
    pub fn mean(&self) -> Option<f64> {
        mean(self.values.iter().copied().flatten())
    }
}

impl From<Vec<Option<f64>>> for ClassIoU {
    fn from(values: Vec<Option<f64>>) -> Self {
        Self::new(values)
    }
}

/// Average each class over the batches where it was defined, then average the
/// per-class means into a single score.
pub fn finalize(batches: &[ClassIoU]) -> Result<(f64, ClassIoU), MetricError> {
    let first = batches.first().ok_or(MetricError::Empty)?;
    let num_classes = first.len();

    if let Some(batch) = batches.iter().find(|b| b.len() != num_classes) {
        return Err(MetricError::ClassCount {
            expected: num_classes,
            actual: batch.len(),
        });
    }

    let per_class: ClassIoU = (0..num_classes)
        .map(|class| mean(batches.iter().filter_map(|b| b.get(class))))
        .collect::<Vec<_>>()
        .into();

    let overall = per_class.mean().ok_or(MetricError::Undefined)?;

    Ok((overall, per_class))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
