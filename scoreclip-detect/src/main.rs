use std::{io::Write as _, path::PathBuf};

use clap::Parser;
use opencv::prelude::*;
use scoreclip_detect::{DetectConfig, FrameDetector, seasons::s2022_powerplay::PowerPlayDetector, utils::imread_rgb};

/// Runs the scoreboard detector on a single still frame and prints what it read.
#[derive(clap::Parser)]
struct Cli {
    /// Image file to read
    fname: PathBuf,
    /// JSON detector config
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    let config = match &cli.config {
        Some(path) => DetectConfig::load(path)?,
        None => DetectConfig::default(),
    };

    let frame = imread_rgb(&cli.fname)?;
    let detector = PowerPlayDetector::new(&config, frame.cols(), frame.rows())?;
    let verdict = detector.detect(&frame)?;

    writeln!(std::io::stdout(), "{}", serde_json::to_string_pretty(&verdict)?)?;
    Ok(())
}
