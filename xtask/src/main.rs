use anyhow::Result;
use clap::{Parser, Subcommand};

mod tasks;

#[derive(Parser)]
#[command(
    name = "unet-eval",
    about = "Evaluate U-Net segmentation checkpoints",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mean IoU over the whole validation set.
    Evaluate(tasks::evaluate::EvaluateArgs),
    /// Colour one prediction next to its ground truth.
    Predict(tasks::predict::PredictArgs),
}

fn main() -> Result<()> {
    tasks::init_tracing();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate(args) => tasks::evaluate::run(args),
        Commands::Predict(args) => tasks::predict::run(args),
    }
}
