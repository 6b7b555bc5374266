//! Runs pass 1 over a synthetic video whose frames carry their own index.

use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

use opencv::{core::{self as cvcore, Mat}, prelude::*};
use scoreclip::{
    config::ScanConfig,
    pass1::{ScanSegment, Scanner},
};
use scoreclip_detect::{FrameDetector, FrameVerdict, MatchDetection, MatchPhase, Rejection};
use scoreclip_io::{FrameSource, VideoInfo};

#[derive(Debug, Clone, Copy)]
struct FakeVideo {
    fps: f64,
    frames: i64,
    /// What the container claims until the source is reopened
    reported: i64,
}

struct FakeSource {
    video: FakeVideo,
    reported: i64,
    next: i64,
    last: i64,
    reopens: Arc<AtomicUsize>,
}

impl FakeSource {
    fn new(video: FakeVideo, reopens: Arc<AtomicUsize>) -> Self {
        Self { video, reported: video.reported, next: 0, last: -1, reopens }
    }
}

impl FrameSource for FakeSource {
    fn info(&self) -> VideoInfo {
        VideoInfo { fps: self.video.fps, width: 2, height: 1, frame_count: self.video.reported }
    }

    fn frame_count(&self) -> anyhow::Result<i64> {
        Ok(self.reported)
    }

    fn seek(&mut self, frame: i64) -> anyhow::Result<()> {
        self.next = frame;
        Ok(())
    }

    fn reopen(&mut self, frame: i64) -> anyhow::Result<()> {
        self.reopens.fetch_add(1, Ordering::SeqCst);
        // the writer has caught up by now
        self.reported = self.video.frames;
        self.seek(frame)
    }

    fn grab(&mut self) -> anyhow::Result<bool> {
        if self.next >= self.video.frames {
            return Ok(false);
        }
        self.last = self.next;
        self.next += 1;
        Ok(true)
    }

    fn retrieve(&mut self) -> anyhow::Result<Mat> {
        let idx = self.last;
        Ok(Mat::new_rows_cols_with_default(
            1,
            2,
            cvcore::CV_8UC3,
            cvcore::Scalar::new((idx % 256) as f64, (idx / 256) as f64, 0., 0.),
        )?)
    }

    fn position_secs(&self) -> anyhow::Result<f64> {
        Ok(self.last as f64 / self.video.fps)
    }
}

/// Reads the frame index back out of the pixels. Every third sampled second has an unreadable timer.
struct IndexDetector;

impl FrameDetector for IndexDetector {
    fn detect(&self, frame: &Mat) -> anyhow::Result<FrameVerdict> {
        let bytes = frame.data_bytes()?;
        let idx = bytes[0] as u64 + bytes[1] as u64 * 256;
        let second = idx / 30;
        if second % 3 == 2 {
            return Ok(FrameVerdict::Rejected(Rejection::BadTimer("I2".to_string())));
        }
        Ok(FrameVerdict::Detected(MatchDetection {
            name: format!("Qualification {}", second / 10 + 1),
            top: false,
            phase: MatchPhase::Teleop,
            time: 120 - second % 120,
            red_teams: vec!["1".to_string(), "2".to_string()],
            blue_teams: vec!["3".to_string(), "4".to_string()],
            colors_swapped: false,
        }))
    }
}

fn config(debug: bool) -> ScanConfig {
    ScanConfig { poll_seconds: 1.0, recovery_delay_secs: 0.0, threads: None, debug }
}

fn scan(video: FakeVideo, threads: usize, debug: bool) -> (scoreclip::pass1::ScanOutput, usize) {
    let reopens = Arc::new(AtomicUsize::new(0));
    let config = config(debug);
    let output = Scanner::quiet(&config)
        .scan(
            || Ok(FakeSource::new(video, reopens.clone())),
            |_info: &VideoInfo| Ok(IndexDetector),
            ScanSegment::new(0, None),
            threads,
        )
        .unwrap();
    (output, reopens.load(Ordering::SeqCst))
}

#[test]
fn samples_once_per_second_and_drops_rejections() {
    let video = FakeVideo { fps: 30.0, frames: 900, reported: 900 };
    let (output, _) = scan(video, 1, true);

    let frames = output.result.observations.iter().map(|o| o.frame_idx).collect::<Vec<_>>();
    let expected = (0..30).filter(|s| s % 3 != 2).map(|s| s * 30).collect::<Vec<i64>>();
    assert_eq!(frames, expected);
    assert!(output.result.observations.iter().all(|o| o.is_replay.is_none()));
    assert_eq!(output.result.observations[1].video_secs, 1.0);

    let diagnostics = output.diagnostics.unwrap();
    assert_eq!(diagnostics.frames_sampled, 30);
    assert_eq!(diagnostics.detections, 20);
    assert_eq!(diagnostics.rejections["bad_timer"], 10);
}

#[test]
fn diagnostics_only_when_debugging() {
    let video = FakeVideo { fps: 30.0, frames: 90, reported: 90 };
    let (output, _) = scan(video, 1, false);
    assert!(output.diagnostics.is_none());
    assert_eq!(output.result.frame_count, 90);
}

#[test]
fn parallel_scan_matches_sequential_scan() {
    // 1000 frames doesn't split evenly into 3 or 7 segments, or into whole seconds
    let video = FakeVideo { fps: 30.0, frames: 1000, reported: 1000 };
    let (sequential, _) = scan(video, 1, false);
    for threads in [2, 3, 7] {
        let (parallel, _) = scan(video, threads, false);
        assert_eq!(parallel.result, sequential.result, "threads = {threads}");
    }
}

#[test]
fn underreported_length_is_recovered_by_reopening() {
    let full = FakeVideo { fps: 30.0, frames: 1000, reported: 1000 };
    let growing = FakeVideo { fps: 30.0, frames: 1000, reported: 600 };

    let (expected, _) = scan(full, 1, false);
    let (recovered, reopens) = scan(growing, 1, true);

    assert_eq!(recovered.result.observations, expected.result.observations);
    // once when catching up with the writer, once more at the real end
    assert_eq!(reopens, 2);
    assert_eq!(recovered.diagnostics.unwrap().reopens, 2);
    // the length handed to pass 2 is the grown one, not the one seen at open time
    assert_eq!(recovered.result.frame_count, 1000);
    assert_eq!(recovered.result.duration_secs(), Some(1000.0 / 30.0));

    let (parallel, _) = scan(growing, 4, false);
    assert_eq!(parallel.result.observations, expected.result.observations);
    assert_eq!(parallel.result.frame_count, 1000);
}
