use std::path::PathBuf;

use anyhow::{Result, anyhow};
use burn::prelude::*;
use clap::Args;
use tracing::info;
use unet_eval::{
    ClassInfo, EvalConfig, RunSummary, SegmentationDataset, SegmentationLoader, UNet,
    checkpoint::{latest_checkpoint, load_unet, model_name},
    dataset::image_label_pairs,
};

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// JSON configuration file. Flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// CSV file with one `name,r,g,b` line per class.
    #[arg(long)]
    pub classes: Option<PathBuf>,

    #[arg(long)]
    pub images_dir: Option<PathBuf>,

    #[arg(long)]
    pub labels_dir: Option<PathBuf>,

    #[arg(short, long)]
    pub batch_size: Option<usize>,

    #[arg(long, num_args = 2, value_names = ["HEIGHT", "WIDTH"])]
    pub image_size: Option<Vec<usize>>,

    #[arg(long)]
    pub base_channels: Option<usize>,

    #[arg(long)]
    pub depth: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Run on the ndarray CPU backend instead of wgpu.
    #[arg(long, default_value_t = false)]
    pub cpu: bool,
}

impl SessionArgs {
    pub fn resolve(&self) -> Result<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::from_file(path)?,
            None => EvalConfig::new(
                required(&self.checkpoint_dir, "--checkpoint-dir")?,
                required(&self.classes, "--classes")?,
                required(&self.images_dir, "--images-dir")?,
                required(&self.labels_dir, "--labels-dir")?,
            ),
        };

        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint_dir = dir.clone();
        }
        if let Some(path) = &self.classes {
            config.classes_path = path.clone();
        }
        if let Some(dir) = &self.images_dir {
            config.images_dir = dir.clone();
        }
        if let Some(dir) = &self.labels_dir {
            config.labels_dir = dir.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(&[height, width]) = self.image_size.as_deref() {
            config.image_size = [height, width];
        }
        if let Some(base_channels) = self.base_channels {
            config.model.base_channels = base_channels;
        }
        if let Some(depth) = self.depth {
            config.model.depth = depth;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn required(value: &Option<PathBuf>, flag: &str) -> Result<PathBuf> {
    value
        .clone()
        .ok_or_else(|| anyhow!("{flag} is required when no --config file is given"))
}

/// Everything one run needs: the loaded model and the validation batches.
pub struct Session<B: Backend> {
    pub model_name: String,
    pub model: UNet<B>,
    pub loader: SegmentationLoader<B>,
}

impl<B: Backend> Session<B> {
    pub fn open(config: EvalConfig, device: B::Device) -> Result<Self> {
        let classes = ClassInfo::from_file(&config.classes_path)?;
        info!(
            classes = classes.num_classes(),
            path = %config.classes_path.display(),
            "loaded class table"
        );

        let checkpoint = latest_checkpoint(&config.checkpoint_dir, &config.checkpoint_extension)?;
        println!("--> Loading model from {}", checkpoint.display());

        let model = load_unet::<B>(
            &checkpoint,
            &config.unet_config(classes.num_classes()),
            &device,
        )?;

        println!(
            "Loading validation pairs from {}...",
            config.images_dir.display()
        );
        let pairs = image_label_pairs(&config.images_dir, &config.labels_dir)?;
        println!("Loaded {} samples", pairs.len());

        let dataset = SegmentationDataset::new(pairs, classes, config.image_size)?;
        let loader = SegmentationLoader::new(dataset, device, config.batch_size)?;

        Ok(Self {
            model_name: model_name(&checkpoint),
            model,
            loader,
        })
    }

    pub fn classes(&self) -> &ClassInfo {
        self.loader.dataset().classes()
    }

    pub fn summary(&self) -> Result<RunSummary> {
        Ok(RunSummary::from_loader(
            self.model_name.clone(),
            &self.loader,
        )?)
    }
}
