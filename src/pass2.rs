//! Second pass: turn the per-frame readings into one time range per match.
//!
//! Readings of the same match are consecutive, so matches are runs of equal names. Short runs are OCR
//! noise (a misread name in the middle of a match, or a flash of the overlay between matches); those
//! are dropped and the remainder re-coalesced, which also glues back together a match that a misread
//! had split in two.
//!
//! The start and end of each match come from its timer readings:
//! - the autonomous timer counts down from 30; a reading `t` seen at `ts` puts the start at `ts - (30 - t)`.
//!   Readings at or below the switchover threshold are the auto/teleop transition countdown and are ignored.
//! - the teleop timer counts down from 120; the lowest reading gives the end, the highest gives a
//!   fallback start when autonomous was never seen.
//! - with no teleop at all, the end is the autonomous end plus the rest of a full match.
use crate::{
    config::GroupConfig,
    model::{EventScanResult, MatchSegment, RawObservation, TimerReading},
};

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error(
        "match {name:?} ({observations} readings between {first_secs:.1}s and {last_secs:.1}s) has no usable timer reading, \
         so its boundaries cannot be inferred"
    )]
    Unbounded {
        name: String,
        observations: usize,
        first_secs: f64,
        last_secs: f64,
    },
}

/// Timer readings a match's boundaries are computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundaryReadings {
    /// Highest autonomous timer, earliest among equals
    pub auto: Option<TimerReading>,
    /// Highest teleop timer, earliest among equals
    pub tele_max: Option<TimerReading>,
    /// Lowest non-zero teleop timer, latest among equals
    pub tele_min: Option<TimerReading>,
}

impl BoundaryReadings {
    pub fn collect(run: &[RawObservation], config: &GroupConfig) -> Self {
        let mut readings = Self::default();
        for obs in run {
            let reading = TimerReading::from(obs);
            if obs.is_teleop() {
                if obs.timer == 0 {
                    continue;
                }
                if readings.tele_max.is_none_or(|max| reading.timer > max.timer) {
                    readings.tele_max = Some(reading);
                }
                if readings.tele_min.is_none_or(|min| reading.timer <= min.timer) {
                    readings.tele_min = Some(reading);
                }
            } else if obs.timer < config.auto_duration
                && readings.auto.is_none_or(|max| reading.timer > max.timer)
            {
                readings.auto = Some(reading);
            }
        }

        if readings.auto.is_some_and(|auto| auto.timer <= config.switchover_max) {
            // all we saw was the switchover countdown
            readings.auto = None;
        }
        readings
    }

    pub fn start(&self, config: &GroupConfig) -> Option<f64> {
        let start = if let Some(auto) = self.auto {
            auto.video_secs - config.auto_duration.saturating_sub(auto.timer) as f64 - config.pre_auto_margin
        } else {
            let tele = self.tele_max?;
            tele.video_secs
                - config.teleop_duration.saturating_sub(tele.timer) as f64
                - config.auto_tele_gap
                - config.pre_auto_margin
        };
        Some(start.max(0.0))
    }

    pub fn end(&self, config: &GroupConfig) -> Option<f64> {
        if let Some(tele) = self.tele_min {
            return Some(tele.video_secs + tele.timer as f64 + config.post_tele_margin);
        }
        let auto = self.auto?;
        Some(auto.video_secs + auto.timer as f64 + config.full_match_remainder + config.post_tele_margin)
    }
}

/// Splits `items` into runs; `sep` says whether an item starts a new run given the current one.
fn split_runs<'a, T>(items: &'a [T], mut sep: impl FnMut(&T, &[T]) -> bool) -> Vec<&'a [T]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..items.len() {
        if sep(&items[i], &items[start..i]) {
            runs.push(&items[start..i]);
            start = i;
        }
    }
    if start < items.len() {
        runs.push(&items[start..]);
    }
    runs
}

/// Maximal runs of consecutive observations with the same match name.
pub fn coalesce(observations: &[RawObservation]) -> Vec<&[RawObservation]> {
    split_runs(observations, |obs, run| obs.name != run[0].name)
}

/// Most common value; ties go to whichever was seen first.
pub fn majority<T: PartialEq>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().is_none_or(|(_, best_count)| count > *best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// How one match's boundaries were arrived at.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchDiagnostics {
    pub name: String,
    pub observations: usize,
    pub readings: BoundaryReadings,
    /// `None` if the match was skipped
    pub segment: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroupDiagnostics {
    pub runs_before_filter: usize,
    pub runs_after_filter: usize,
    pub dropped_observations: usize,
    pub matches: Vec<MatchDiagnostics>,
}

#[derive(Debug, Clone)]
pub struct GroupOutput {
    pub segments: Vec<MatchSegment>,
    pub diagnostics: Option<GroupDiagnostics>,
}

/// Groups a pass 1 scan into match segments.
pub fn group(scan: &EventScanResult, config: &GroupConfig) -> Result<GroupOutput, GroupError> {
    let mut diagnostics = GroupDiagnostics::default();

    let runs = coalesce(&scan.observations);
    diagnostics.runs_before_filter = runs.len();
    let kept = runs
        .iter()
        .filter(|run| {
            let keep = run.len() >= config.min_group_count;
            if !keep {
                tracing::debug!("dropping {} stray reading(s) of {:?}", run.len(), run[0].name);
                diagnostics.dropped_observations += run.len();
            }
            keep
        })
        .flat_map(|run| run.iter().cloned())
        .collect::<Vec<RawObservation>>();

    let runs = coalesce(&kept);
    diagnostics.runs_after_filter = runs.len();
    tracing::info!(
        "{} reading runs, {} after dropping noise",
        diagnostics.runs_before_filter,
        diagnostics.runs_after_filter,
    );

    // a recording can outgrow the length it reported; never clamp below what was actually read
    let last_read = scan.observations.last().map_or(0.0, |obs| obs.video_secs);
    let duration = scan.duration_secs().map(|duration| duration.max(last_read));
    let mut segments = Vec::with_capacity(runs.len());
    for run in runs {
        let readings = BoundaryReadings::collect(run, config);
        let name = run[0].name.clone();
        let bounds = readings.start(config).zip(readings.end(config));

        let Some((start, end)) = bounds else {
            let err = GroupError::Unbounded {
                name: name.clone(),
                observations: run.len(),
                first_secs: run[0].video_secs,
                last_secs: run[run.len() - 1].video_secs,
            };
            if !config.skip_unbounded {
                return Err(err);
            }
            tracing::warn!("skipping: {err}");
            diagnostics.matches.push(MatchDiagnostics { name, observations: run.len(), readings, segment: None });
            continue;
        };

        let (start, end) = match duration {
            Some(duration) => (start.min(duration), end.min(duration)),
            None => (start, end),
        };
        let end = end.max(start);

        let segment = MatchSegment {
            name: name.clone(),
            start,
            end,
            red_teams: majority(run.iter().map(|o| &o.red_teams)).cloned().unwrap_or_default(),
            blue_teams: majority(run.iter().map(|o| &o.blue_teams)).cloned().unwrap_or_default(),
            is_replay: majority(run.iter().map(|o| o.is_replay)).flatten(),
            top: majority(run.iter().map(|o| o.top)).unwrap_or_default(),
            colors_swapped: majority(run.iter().map(|o| o.colors_swapped)).unwrap_or_default(),
        };
        tracing::info!("{segment}");
        diagnostics.matches.push(MatchDiagnostics {
            name,
            observations: run.len(),
            readings,
            segment: Some((start, end)),
        });
        segments.push(segment);
    }

    Ok(GroupOutput {
        segments,
        diagnostics: config.debug.then_some(diagnostics),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreclip_detect::MatchPhase;

    fn obs(name: &str, video_secs: f64, teleop: bool, timer: u64) -> RawObservation {
        RawObservation {
            name: name.to_string(),
            top: false,
            frame_idx: (video_secs * 30.0) as i64,
            video_secs,
            phase: if teleop { MatchPhase::Teleop } else { MatchPhase::Autonomous },
            timer,
            red_teams: vec!["1".to_string(), "2".to_string()],
            blue_teams: vec!["3".to_string(), "4".to_string()],
            is_replay: None,
            colors_swapped: false,
        }
    }

    fn scan(observations: Vec<RawObservation>) -> EventScanResult {
        EventScanResult { fps: 30.0, width: 1920, height: 1080, frame_count: 0, observations }
    }

    fn names(runs: &[&[RawObservation]]) -> Vec<(String, usize)> {
        runs.iter().map(|r| (r[0].name.clone(), r.len())).collect()
    }

    /// A full match: autonomous counting down from `t0`, then teleop.
    fn full_match(name: &str, t0: f64) -> Vec<RawObservation> {
        let mut out = (0..25).map(|i| obs(name, t0 + i as f64, false, 29 - i)).collect::<Vec<_>>();
        out.extend((0..110).map(|i| obs(name, t0 + 38.0 + i as f64, true, 119 - i)));
        out
    }

    #[test]
    fn coalesces_runs_of_equal_names() {
        let observations = ["A", "A", "A", "B", "B", "A", "A"]
            .iter()
            .enumerate()
            .map(|(i, name)| obs(name, i as f64, true, 100))
            .collect::<Vec<_>>();
        let runs = coalesce(&observations);
        assert_eq!(names(&runs), vec![("A".into(), 3), ("B".into(), 2), ("A".into(), 2)]);
        assert!(coalesce(&[]).is_empty());
    }

    #[test]
    fn drops_short_runs_and_rejoins() {
        let config = GroupConfig { debug: true, ..Default::default() };
        let mut observations = full_match("A", 10.0);
        // misread in the middle of the match
        observations.splice(60..60, (0..4).map(|i| obs("Ax", 70.0 + i as f64, true, 90)));
        // five readings survive
        observations.extend((0..5).map(|i| obs("B", 400.0 + i as f64, true, 100 - i)));

        let output = group(&scan(observations), &config).unwrap();
        assert_eq!(output.segments.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);

        let diagnostics = output.diagnostics.unwrap();
        assert_eq!(diagnostics.runs_before_filter, 4);
        assert_eq!(diagnostics.runs_after_filter, 2);
        assert_eq!(diagnostics.dropped_observations, 4);
    }

    #[test]
    fn majority_vote_ties_go_first() {
        let a = vec!["1", "2", "3"];
        let b = vec!["1", "2", "4"];
        assert_eq!(majority([&a, &b, &a, &a]), Some(&a));
        assert_eq!(majority([&b, &a, &a, &b]), Some(&b));
        assert_eq!(majority([false, true]), Some(false));
        assert_eq!(majority(Vec::<bool>::new()), None);
    }

    #[test]
    fn consensus_teams() {
        let mut run = full_match("A", 0.0);
        run[3].red_teams = vec!["1".to_string(), "7".to_string()];
        run[4].colors_swapped = true;
        let output = group(&scan(run), &GroupConfig::default()).unwrap();
        let segment = &output.segments[0];
        assert_eq!(segment.red_teams, vec!["1", "2"]);
        assert_eq!(segment.blue_teams, vec!["3", "4"]);
        assert!(!segment.colors_swapped);
        assert_eq!(segment.is_replay, None);
        assert!(output.diagnostics.is_none());
    }

    #[test]
    fn boundaries_from_auto_and_teleop() {
        let config = GroupConfig::default();
        let run = vec![
            obs("A", 99.0, false, 4),
            obs("A", 100.0, false, 5),
            obs("A", 101.0, false, 4),
            obs("A", 230.0, true, 11),
            obs("A", 240.0, true, 1),
            obs("A", 241.0, true, 0),
        ];
        let readings = BoundaryReadings::collect(&run, &GroupConfig { switchover_max: 3, ..config.clone() });
        assert_eq!(readings.auto, Some(TimerReading { timer: 5, video_secs: 100.0 }));
        assert_eq!(readings.tele_min, Some(TimerReading { timer: 1, video_secs: 240.0 }));
        assert_eq!(readings.start(&config), Some(72.0));
        assert_eq!(readings.end(&config), Some(246.0));
    }

    #[test]
    fn tie_rules() {
        let config = GroupConfig::default();
        let run = vec![
            obs("A", 10.0, false, 20),
            obs("A", 11.0, false, 20),
            obs("A", 50.0, true, 100),
            obs("A", 51.0, true, 100),
            obs("A", 150.0, true, 2),
            obs("A", 151.0, true, 2),
        ];
        let readings = BoundaryReadings::collect(&run, &config);
        assert_eq!(readings.auto.unwrap().video_secs, 10.0);
        assert_eq!(readings.tele_max.unwrap().video_secs, 50.0);
        assert_eq!(readings.tele_min.unwrap().video_secs, 151.0);
    }

    #[test]
    fn switchover_countdown_is_not_autonomous() {
        let config = GroupConfig::default();
        let run = vec![obs("A", 40.0, false, 8), obs("A", 41.0, false, 7), obs("A", 60.0, true, 110)];
        let readings = BoundaryReadings::collect(&run, &config);
        assert_eq!(readings.auto, None);
        // teleop fallback: 60 - (120 - 110) - 38 - 3
        assert_eq!(readings.start(&config), Some(9.0));
        // timers of 30 and up are not autonomous either
        let readings = BoundaryReadings::collect(&[obs("A", 40.0, false, 30)], &config);
        assert_eq!(readings.auto, None);
    }

    #[test]
    fn teleop_only_and_auto_only() {
        let config = GroupConfig::default();
        let teleop = BoundaryReadings::collect(&[obs("A", 200.0, true, 120), obs("A", 300.0, true, 20)], &config);
        assert_eq!(teleop.start(&config), Some(159.0));
        assert_eq!(teleop.end(&config), Some(325.0));

        let auto = BoundaryReadings::collect(&[obs("A", 50.0, false, 20), obs("A", 55.0, false, 15)], &config);
        assert_eq!(auto.start(&config), Some(37.0));
        assert_eq!(auto.end(&config), Some(203.0));

        // start never goes negative
        let early = BoundaryReadings::collect(&[obs("A", 2.0, false, 29)], &config);
        assert_eq!(early.start(&config), Some(0.0));
    }

    #[test]
    fn unbounded_run_fails_unless_skipped() {
        let mut observations = full_match("A", 0.0);
        observations.extend((0..6).map(|i| obs("B", 300.0 + i as f64, true, 0)));

        let err = group(&scan(observations.clone()), &GroupConfig::default()).unwrap_err();
        assert!(matches!(&err, GroupError::Unbounded { name, observations: 6, .. } if name == "B"), "{err}");

        let config = GroupConfig { skip_unbounded: true, debug: true, ..Default::default() };
        let output = group(&scan(observations), &config).unwrap();
        assert_eq!(output.segments.len(), 1);
        assert_eq!(output.segments[0].name, "A");
        let skipped = &output.diagnostics.unwrap().matches[1];
        assert_eq!(skipped.name, "B");
        assert_eq!(skipped.segment, None);
    }

    #[test]
    fn end_is_clamped_to_video() {
        let mut scan = scan(full_match("A", 100.0));
        // 200 seconds at 30 fps
        scan.frame_count = 6000;
        let output = group(&scan, &GroupConfig::default()).unwrap();
        let segment = &output.segments[0];
        // 100 - (30 - 29) - 3
        assert_eq!(segment.start, 96.0);
        assert_eq!(segment.end, 200.0);

        let unclamped = group(&EventScanResult { frame_count: 0, ..scan }, &GroupConfig::default()).unwrap();
        // last teleop reading: 100 + 38 + 109 seconds showing 10
        assert_eq!(unclamped.segments[0].end, 100.0 + 38.0 + 109.0 + 10.0 + 5.0);
    }

    #[test]
    fn stale_length_does_not_collapse_later_matches() {
        // the scan claims 20 seconds but has readings up to 34 seconds
        let mut observations = (0..5).map(|i| obs("A", 22.0 + i as f64, false, 29 - i)).collect::<Vec<_>>();
        observations.extend((0..5).map(|i| obs("A", 30.0 + i as f64, true, 100 - i)));
        let mut scan = scan(observations);
        scan.frame_count = 600;

        let segment = &group(&scan, &GroupConfig::default()).unwrap().segments[0];
        // 22 - (30 - 29) - 3
        assert_eq!(segment.start, 18.0);
        assert_eq!(segment.end, 34.0);
    }

    #[test]
    fn out_of_range_auto_timer_does_not_underflow() {
        let config = GroupConfig::default();
        let readings = BoundaryReadings {
            auto: Some(TimerReading { timer: 45, video_secs: 100.0 }),
            ..Default::default()
        };
        assert_eq!(readings.start(&config), Some(97.0));
    }
}
