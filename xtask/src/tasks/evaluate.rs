use std::path::PathBuf;

use anyhow::{Result, anyhow};
use burn::{
    backend::{NdArray, Wgpu, ndarray::NdArrayDevice, wgpu::WgpuDevice},
    prelude::*,
};
use clap::Args;
use serde::Serialize;
use unet_eval::{
    MeanIoUReport, RunSummary,
    evaluate::{format_report, mean_iou},
};

use super::session::{Session, SessionArgs};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Write the summary and scores to this JSON file.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Save the resolved configuration as JSON before running.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

#[derive(Serialize)]
struct EvaluationOutput<'a> {
    summary: &'a RunSummary,
    classes: &'a [String],
    report: &'a MeanIoUReport,
}

pub fn run(args: &EvaluateArgs) -> Result<()> {
    if args.session.cpu {
        run_on::<NdArray>(args, NdArrayDevice::default())
    } else {
        run_on::<Wgpu<f32, i32>>(args, WgpuDevice::default())
    }
}

fn run_on<B: Backend>(args: &EvaluateArgs, device: B::Device) -> Result<()> {
    let config = args.session.resolve()?;

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .map_err(|e| anyhow!("Failed to save configuration to {}: {}", path.display(), e))?;
        println!("Saved configuration to {}", path.display());
    }

    let session = Session::<B>::open(config, device)?;

    let summary = session.summary()?;
    println!("\n{summary}\n");

    let report = mean_iou(&session.model, &session.loader)?;
    println!("{}", format_report(&report, session.classes()));

    if let Some(path) = &args.report {
        let output = EvaluationOutput {
            summary: &summary,
            classes: session.classes().names(),
            report: &report,
        };

        std::fs::write(path, serde_json::to_string_pretty(&output)?)
            .map_err(|e| anyhow!("Failed to write report to {}: {}", path.display(), e))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
