use std::fmt;

use burn::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    checkpoint::CheckpointError,
    classes::{ClassInfo, ClassInfoError},
    config::ConfigError,
    dataset::{DatasetError, SegmentationLoader},
    metrics::{MeanIoU, MeanIoUReport, MetricError, labels_to_vec},
    model::SegmentationModel,
    visualize::{Prediction, VisualizeError, image_from_tensor, predict_label_map},
};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Classes(#[from] ClassInfoError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Visualize(#[from] VisualizeError),

    #[error("Model predicts {model} classes but the classes file defines {classes}")]
    ClassCount { model: usize, classes: usize },
}

/// What is being evaluated, printed before the run starts.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub model_name: String,
    pub batches: usize,
    pub image_shape: [usize; 4],
    pub label_shape: [usize; 4],
    pub num_classes: usize,
}

impl RunSummary {
    /// Shapes are read from the first batch.
    pub fn from_loader<B: Backend>(
        model_name: impl Into<String>,
        loader: &SegmentationLoader<B>,
    ) -> Result<Self, EvalError> {
        let batch = loader.get(0)?;
        let label_shape = batch.labels.dims();

        Ok(Self {
            model_name: model_name.into(),
            batches: loader.len(),
            image_shape: batch.images.dims(),
            label_shape,
            num_classes: label_shape[1],
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--> Model under trial: {}", self.model_name)?;
        writeln!(f, "--> Testing batches: {}", self.batches)?;
        writeln!(f, "--> Image size: {:?}", self.image_shape)?;
        writeln!(f, "--> Label size: {:?}", self.label_shape)?;
        write!(f, "--> No. of classes: {}", self.num_classes)
    }
}

/// Run the model over every batch and accumulate mean IoU.
pub fn mean_iou<B: Backend, M: SegmentationModel<B>>(
    model: &M,
    loader: &SegmentationLoader<B>,
) -> Result<MeanIoUReport, EvalError> {
    let num_classes = loader.dataset().classes().num_classes();
    check_class_count(model, num_classes)?;

    if loader.is_empty() {
        return Err(MetricError::Empty.into());
    }

    let mut metric = MeanIoU::new(num_classes);

    for (index, batch) in loader.iter().enumerate() {
        let batch = batch?;
        let predictions = model.predict(batch.images);
        let iou = metric.update(batch.labels, predictions)?;

        debug!(
            batch = index,
            of = loader.len(),
            mean = ?iou.mean(),
            "batch evaluated"
        );
    }

    let report = metric.finalize()?;
    info!(overall = report.overall, batches = report.batches, "evaluation finished");

    Ok(report)
}

/// Pick a batch and an image inside it, as `(batch, index)`.
pub fn random_sample<B: Backend>(
    loader: &SegmentationLoader<B>,
    seed: u64,
) -> Result<(usize, usize), EvalError> {
    if loader.is_empty() {
        return Err(MetricError::Empty.into());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let batch = rng.random_range(0..loader.len());
    let index = rng.random_range(0..loader.batch_len(batch)?);

    Ok((batch, index))
}

/// Predict one image of the loader and colour both its ground truth and the
/// prediction with the class table.
pub fn predict_sample<B: Backend, M: SegmentationModel<B>>(
    model: &M,
    loader: &SegmentationLoader<B>,
    batch_index: usize,
    image_index: usize,
) -> Result<Prediction, EvalError> {
    let classes: &ClassInfo = loader.dataset().classes();
    check_class_count(model, classes.num_classes())?;

    let batch = loader.get(batch_index)?;
    let [batch_len, _, _, _] = batch.images.dims();
    if image_index >= batch_len {
        return Err(DatasetError::IndexOutOfRange {
            index: image_index,
            len: batch_len,
        }
        .into());
    }

    let range = image_index..image_index + 1;
    let image = batch.images.slice([range.clone()]).squeeze::<3>(0);
    let label = batch.labels.slice([range]).squeeze::<3>(0);

    let predicted = labels_to_vec(predict_label_map(model, image.clone()))?;
    let ground_truth = labels_to_vec(label.argmax(0).squeeze::<2>(0))?;

    let prediction = Prediction::from_labels(
        image_from_tensor(image)?,
        &ground_truth,
        &predicted,
        classes.colors(),
    )?;

    Ok(prediction)
}

/// Per-class table followed by the dataset-level scores.
pub fn format_report(report: &MeanIoUReport, classes: &ClassInfo) -> String {
    let score = |value: Option<f64>| match value {
        Some(value) => format!("{value:.4}"),
        None => "n/a".to_string(),
    };

    let mut lines = vec![format!("--> Mean IoU for test dataset {:.4}", report.overall)];

    for (class, name) in classes.names().iter().enumerate() {
        lines.push(format!(
            "    {name:<24} {:>8} {:>8}",
            score(report.per_class.get(class)),
            score(report.dataset_per_class.get(class)),
        ));
    }

    lines.push(format!(
        "--> Dataset IoU {} | pixel accuracy {}",
        score(report.dataset_overall),
        score(report.pixel_accuracy),
    ));

    lines.join("\n")
}

fn check_class_count<B: Backend, M: SegmentationModel<B>>(
    model: &M,
    classes: usize,
) -> Result<(), EvalError> {
    if model.num_classes() != classes {
        return Err(EvalError::ClassCount {
            model: model.num_classes(),
            classes,
        });
    }

    Ok(())
}
