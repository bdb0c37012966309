use std::path::PathBuf;

use anyhow::Result;
use burn::{
    backend::{NdArray, Wgpu, ndarray::NdArrayDevice, wgpu::WgpuDevice},
    prelude::*,
};
use clap::Args;
use unet_eval::evaluate::{predict_sample, random_sample};

use super::session::{Session, SessionArgs};

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Batch to draw the image from. Random when omitted.
    #[arg(long)]
    pub batch: Option<usize>,

    /// Image index inside the batch.
    #[arg(long, requires = "batch")]
    pub index: Option<usize>,

    #[arg(short, long, default_value = "predictions")]
    pub output_dir: PathBuf,
}

pub fn run(args: &PredictArgs) -> Result<()> {
    if args.session.cpu {
        run_on::<NdArray>(args, NdArrayDevice::default())
    } else {
        run_on::<Wgpu<f32, i32>>(args, WgpuDevice::default())
    }
}

fn run_on<B: Backend>(args: &PredictArgs, device: B::Device) -> Result<()> {
    let config = args.session.resolve()?;
    let seed = config.seed;
    let session = Session::<B>::open(config, device)?;

    println!("\n{}\n", session.summary()?);

    let (batch, index) = match (args.batch, args.index) {
        (Some(batch), index) => (batch, index.unwrap_or(0)),
        (None, _) => random_sample(&session.loader, seed)?,
    };

    println!("Predicting image {index} of batch {batch}...");
    let prediction = predict_sample(&session.model, &session.loader, batch, index)?;

    for path in prediction.save(&args.output_dir)? {
        println!("Saved {}", path.display());
    }

    Ok(())
}
