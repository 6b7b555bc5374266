use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::Parser;
use scoreclip::{
    config::Config,
    model::EventScanResult,
    pass1::{ScanOutput, ScanSegment, Scanner},
    pass2,
};
use scoreclip_detect::seasons::s2022_powerplay::PowerPlayDetector;
use scoreclip_io::{CaptureSource, FrameSource, VideoInfo, time};

#[derive(clap::Parser)]
#[command(version, about = "Finds match timestamps in event livestream recordings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// JSON config file; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write output here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Collect and log diagnostics
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Pass 1: sample the video and write the raw readings as JSON
    Scan {
        video: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Pass 2: group the readings of a previous scan into matches
    Group {
        scan: PathBuf,
    },
    /// Both passes
    Run {
        video: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Number of segments to scan in parallel
    #[arg(long)]
    threads: Option<usize>,
    /// Scan in one pass from start to end
    #[arg(long, conflicts_with = "threads")]
    sequential: bool,
    /// Where to start scanning, as SS, MM:SS or HH:MM:SS
    #[arg(long, value_parser = parse_timestamp)]
    start: Option<i64>,
    /// How much to scan, as SS, MM:SS or HH:MM:SS
    #[arg(long, value_parser = parse_timestamp)]
    duration: Option<i64>,
}

impl ScanArgs {
    fn segment(&self, info: &VideoInfo) -> ScanSegment {
        let start_frame = self.start.map_or(0, |us| info.frame_at(time::us_to_secs(us)));
        let frame_count = self.duration.map(|us| info.frame_at(time::us_to_secs(us)));
        ScanSegment::new(start_frame, frame_count)
    }

    fn threads(&self, config: &Config) -> usize {
        if self.sequential {
            1
        } else {
            self.threads.unwrap_or_else(|| config.scan.threads())
        }
    }
}

fn parse_timestamp(s: &str) -> Result<i64, String> {
    time::parse_time(s).ok_or_else(|| format!("invalid timestamp {s:?}"))
}

fn scan(video: &Path, args: &ScanArgs, config: &Config) -> anyhow::Result<ScanOutput> {
    let info = CaptureSource::open(video)?.info();
    let segment = args.segment(&info);
    tracing::info!(
        "scanning {} from {}",
        video.display(),
        time::hms(segment.start_frame as f64 / info.fps),
    );

    let output = Scanner::new(&config.scan).scan(
        || CaptureSource::open(video),
        |info| PowerPlayDetector::new(&config.detect, info.width, info.height),
        segment,
        args.threads(config),
    )?;
    if let Some(diagnostics) = &output.diagnostics {
        tracing::info!("scan diagnostics: {}", serde_json::to_string_pretty(diagnostics)?);
    }
    Ok(output)
}

fn group(scan: &EventScanResult, config: &Config) -> anyhow::Result<Vec<scoreclip::model::MatchSegment>> {
    let output = pass2::group(scan, &config.group)?;
    if let Some(diagnostics) = &output.diagnostics {
        tracing::info!("group diagnostics: {}", serde_json::to_string_pretty(diagnostics)?);
    }
    tracing::info!("found {} matches", output.segments.len());
    Ok(output.segments)
}

fn write_output(output: Option<&Path>, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?,
        None => writeln!(std::io::stdout(), "{json}")?,
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if cli.debug {
        config.scan.debug = true;
        config.group.debug = true;
    }

    match &cli.command {
        Command::Scan { video, scan: args } => {
            let output = scan(video, args, &config)?;
            write_output(cli.output.as_deref(), &output.result)?;
        }
        Command::Group { scan: path } => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read scan {}", path.display()))?;
            let result: EventScanResult = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse scan {}", path.display()))?;
            let segments = group(&result, &config)?;
            write_output(cli.output.as_deref(), &segments)?;
        }
        Command::Run { video, scan: args } => {
            let output = scan(video, args, &config)?;
            let segments = group(&output.result, &config)?;
            write_output(cli.output.as_deref(), &segments)?;
        }
    }
    Ok(())
}
