//! First pass: sample the recording and read the scoreboard wherever it shows up.
//!
//! Every frame is grabbed but only one per poll interval is decoded and run through the detector.
//! Sampling is keyed on the absolute frame index, so a scan split into segments samples exactly the
//! same frames as a single sequential scan.
//!
//! Long event recordings are often still being written while we read them. When the reader gets close
//! to the frame count the container reports, we give the writer some time, then reopen the file and
//! carry on from where we were.
use std::{collections::BTreeMap, time::{Duration, Instant}};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use scoreclip_detect::{FrameDetector, FrameVerdict};
use scoreclip_io::{FrameSource, VideoInfo, time::hms};

use crate::{config::ScanConfig, model::{EventScanResult, RawObservation}};

/// Reopen when fewer than this many frames are left before the reported end.
const END_OF_STREAM_SLACK: i64 = 3;

/// A contiguous range of frames to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScanSegment {
    pub start_frame: i64,
    /// `None` reads until the stream ends.
    pub frame_count: Option<i64>,
}

impl ScanSegment {
    pub const fn new(start_frame: i64, frame_count: Option<i64>) -> Self {
        Self { start_frame, frame_count }
    }

    pub fn end_frame(&self) -> Option<i64> {
        self.frame_count.map(|count| self.start_frame + count)
    }

    /// Splits this segment into at most `n` contiguous pieces.
    ///
    /// `available` is the frame count of the whole video, used to size an open-ended segment. The last
    /// piece absorbs the remainder and keeps this segment's end, so an open-ended scan stays open-ended.
    pub fn split(&self, n: usize, available: i64) -> Vec<ScanSegment> {
        let len = self.frame_count.unwrap_or(available - self.start_frame).max(0);
        let n = (n.max(1) as i64).min(len);
        if n <= 1 {
            return vec![*self];
        }
        let piece = len / n;
        (0..n)
            .map(|i| {
                let start_frame = self.start_frame + i * piece;
                let frame_count = if i == n - 1 {
                    self.frame_count.map(|count| count - i * piece)
                } else {
                    Some(piece)
                };
                ScanSegment { start_frame, frame_count }
            })
            .collect()
    }
}

/// Splits a `frame_count` frame video into `n` segments.
pub fn partition(frame_count: i64, n: usize) -> Vec<ScanSegment> {
    ScanSegment::new(0, Some(frame_count)).split(n, frame_count)
}

/// Counters collected while scanning. Only handed back when debugging.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanDiagnostics {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub detections: u64,
    /// Sampled frames that were not used, by reason
    pub rejections: BTreeMap<String, u64>,
    pub reopens: u64,
    pub elapsed_secs: f64,
}

impl ScanDiagnostics {
    /// Adds up counters; elapsed time is the longest of the two since segments run concurrently.
    pub fn merge(&mut self, other: &ScanDiagnostics) {
        self.frames_read += other.frames_read;
        self.frames_sampled += other.frames_sampled;
        self.detections += other.detections;
        for (reason, count) in &other.rejections {
            *self.rejections.entry(reason.clone()).or_default() += count;
        }
        self.reopens += other.reopens;
        self.elapsed_secs = self.elapsed_secs.max(other.elapsed_secs);
    }
}

/// Observations read from one segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentScan {
    pub observations: Vec<RawObservation>,
    pub diagnostics: ScanDiagnostics,
    /// Largest frame count seen, reported or read. Grows past the open-time count for live recordings.
    pub frames_seen: i64,
}

/// Concatenates segment results in segment order.
pub fn merge_segments(scans: Vec<SegmentScan>) -> SegmentScan {
    scans.into_iter().fold(SegmentScan::default(), |mut merged, scan| {
        merged.observations.extend(scan.observations);
        merged.diagnostics.merge(&scan.diagnostics);
        merged.frames_seen = merged.frames_seen.max(scan.frames_seen);
        merged
    })
}

#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub result: EventScanResult,
    pub diagnostics: Option<ScanDiagnostics>,
}

pub struct Scanner<'a> {
    config: &'a ScanConfig,
    progress: MultiProgress,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        Self { config, progress: MultiProgress::new() }
    }

    /// Scanner that never draws progress bars.
    pub fn quiet(config: &'a ScanConfig) -> Self {
        Self { config, progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()) }
    }

    /// Scans `range` of the video on `threads` workers.
    ///
    /// Each worker opens its own source and builds its own detector, so neither has to be shared
    /// across threads.
    pub fn scan<S, D>(
        &self,
        open_source: impl Fn() -> anyhow::Result<S> + Sync,
        make_detector: impl Fn(&VideoInfo) -> anyhow::Result<D> + Sync,
        range: ScanSegment,
        threads: usize,
    ) -> anyhow::Result<ScanOutput>
    where
        S: FrameSource,
        D: FrameDetector,
    {
        let mut info = open_source()?.info();
        let segments = range.split(threads, info.frame_count);
        tracing::info!(
            "scanning {} frames at {:.3} fps in {} segment(s), sampling every {} frames",
            info.frame_count,
            info.fps,
            segments.len(),
            self.config.poll_interval(info.fps),
        );

        let scan_one = |segment: &ScanSegment| -> anyhow::Result<SegmentScan> {
            let mut source = open_source()?;
            let detector = make_detector(&info)?;
            let bar = self.segment_bar(segment, &info)?;
            let scan = self.scan_segment(&mut source, &detector, *segment, &bar);
            bar.finish();
            scan
        };

        let scans = if segments.len() == 1 {
            segments.iter().map(scan_one).collect::<anyhow::Result<Vec<_>>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(segments.len()).build()?;
            pool.install(|| segments.par_iter().map(scan_one).collect::<anyhow::Result<Vec<_>>>())?
        };

        let merged = merge_segments(scans);
        if merged.frames_seen > info.frame_count {
            tracing::info!("video grew from {} to {} frames while scanning", info.frame_count, merged.frames_seen);
            info.frame_count = merged.frames_seen;
        }
        tracing::info!(
            "pass 1 done: {} observations from {} sampled frames",
            merged.observations.len(),
            merged.diagnostics.frames_sampled,
        );
        Ok(ScanOutput {
            result: EventScanResult::new(info, merged.observations),
            diagnostics: self.config.debug.then_some(merged.diagnostics),
        })
    }

    fn segment_bar(&self, segment: &ScanSegment, info: &VideoInfo) -> anyhow::Result<ProgressBar> {
        let len = segment.frame_count.unwrap_or(info.frame_count - segment.start_frame).max(0);
        let bar = self.progress.add(ProgressBar::new(len as u64));
        bar.set_style(ProgressStyle::with_template("{prefix} {wide_bar} {pos}/{len} {per_sec} {msg}")?);
        bar.set_prefix(hms(segment.start_frame as f64 / info.fps));
        Ok(bar)
    }

    /// Reads one segment front to back.
    pub fn scan_segment(
        &self,
        source: &mut impl FrameSource,
        detector: &impl FrameDetector,
        segment: ScanSegment,
        bar: &ProgressBar,
    ) -> anyhow::Result<SegmentScan> {
        let started = Instant::now();
        let interval = self.config.poll_interval(source.info().fps);
        let mut scan = SegmentScan::default();
        let diag = &mut scan.diagnostics;

        source.seek(segment.start_frame)?;
        let mut next = segment.start_frame;
        let mut reopened_at: Option<i64> = None;

        loop {
            if segment.end_frame().is_some_and(|end| next >= end) {
                break;
            }

            let reported = source.frame_count()?;
            scan.frames_seen = scan.frames_seen.max(reported);
            if reported > 0 && reported - next < END_OF_STREAM_SLACK && reopened_at != Some(reported) {
                // only once per reported length, so a stream that has really ended finishes
                reopened_at = Some(reported);
                tracing::warn!(
                    "frame {next} is near the reported end ({reported}), reopening in {}s",
                    self.config.recovery_delay_secs,
                );
                std::thread::sleep(Duration::from_secs_f64(self.config.recovery_delay_secs.max(0.0)));
                source.reopen(next)?;
                diag.reopens += 1;
            }

            if !source.grab()? {
                break;
            }
            let idx = next;
            next += 1;
            scan.frames_seen = scan.frames_seen.max(next);
            diag.frames_read += 1;
            bar.inc(1);

            if idx % interval != 0 {
                continue;
            }
            diag.frames_sampled += 1;

            let frame = source.retrieve()?;
            let video_secs = source.position_secs()?;
            bar.set_message(hms(video_secs));

            match detector.detect(&frame)? {
                FrameVerdict::Detected(detection) => {
                    tracing::trace!("frame {idx} ({video_secs:.3}s): {detection:?}");
                    diag.detections += 1;
                    scan.observations.push(RawObservation::new(idx, video_secs, detection));
                }
                FrameVerdict::Rejected(rejection) => {
                    tracing::debug!("frame {idx} ({video_secs:.3}s) rejected: {rejection:?}");
                    *diag.rejections.entry(rejection.kind().to_string()).or_default() += 1;
                }
            }
        }

        diag.elapsed_secs = started.elapsed().as_secs_f64();
        Ok(scan)
    }
}
