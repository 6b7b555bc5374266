//! Power Play matcher
//!
//! The 2022-2023 overlay carries the FIRST Energize logo at the left end of the name bar, which we use to
//! locate the whole scoreboard. The scoring display sits right above the name bar when the overlay is at
//! the top of the screen and right below it otherwise.
//!
//! Autonomous and teleop share the same timer, so we tell them apart by the endgame cap sprites on either
//! side of it, which only appear once teleop starts.
use opencv::core::Mat;

use crate::{
    DetectConfig, FrameDetector, FrameVerdict, MatchDetection, MatchPhase, Rejection,
    extract,
    geometry::{ReferenceLayout, ScaledGeometry},
    layout::RoiLayout,
    matchers::{EndgameMarkerDetector, TemplateMatcher},
    ocr::{Ocr, TextRecognizer},
};

/// Thresholds that apply after the logo has been found.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub preview: f64,
    pub score_color: f64,
    pub placeholder_token: String,
}

impl From<&DetectConfig> for Thresholds {
    fn from(config: &DetectConfig) -> Self {
        Self {
            preview: config.preview_threshold,
            score_color: config.score_color_threshold,
            placeholder_token: config.placeholder_token.clone(),
        }
    }
}

pub struct PowerPlayDetector {
    geometry: ScaledGeometry,
    logo_detector: TemplateMatcher,
    endgame_detector: EndgameMarkerDetector,
    match_name_ocr: Box<dyn TextRecognizer>,
    match_time_ocr: Box<dyn TextRecognizer>,
    team_ocr: Box<dyn TextRecognizer>,
    thresholds: Thresholds,
}

impl PowerPlayDetector {
    /// Builds a detector sized for `width` x `height` frames, loading assets from `config`.
    pub fn new(config: &DetectConfig, width: i32, height: i32) -> anyhow::Result<Self> {
        let layout = match &config.layout {
            Some(path) => ReferenceLayout::from_roi_layout(&RoiLayout::from_file(path)?),
            None => ReferenceLayout::default(),
        };
        let geometry = layout.scaled(width, height);

        let logo_detector = TemplateMatcher::from_asset(&config.logo_template, &geometry, config.match_size, config.overlay_threshold)?;
        let endgame_detector = EndgameMarkerDetector::from_asset(&config.endgame_template, &geometry, config.match_size, config.endgame_threshold)?;

        Ok(Self {
            logo_detector,
            endgame_detector,
            match_name_ocr: Box::new(Ocr::new(&config.ocr_models, None)?),
            match_time_ocr: Box::new(Ocr::new(&config.ocr_models, Some("0123456789"))?),
            team_ocr: Box::new(Ocr::new(&config.ocr_models, Some("0123456789"))?),
            thresholds: config.into(),
            geometry,
        })
    }

    /// Assembles a detector from already-built parts.
    pub fn from_parts(
        geometry: ScaledGeometry,
        logo_detector: TemplateMatcher,
        endgame_detector: EndgameMarkerDetector,
        match_name_ocr: Box<dyn TextRecognizer>,
        match_time_ocr: Box<dyn TextRecognizer>,
        team_ocr: Box<dyn TextRecognizer>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            geometry,
            logo_detector,
            endgame_detector,
            match_name_ocr,
            match_time_ocr,
            team_ocr,
            thresholds,
        }
    }

    pub fn geometry(&self) -> &ScaledGeometry {
        &self.geometry
    }
}

impl FrameDetector for PowerPlayDetector {
    fn detect(&self, frame: &Mat) -> anyhow::Result<FrameVerdict> {
        // Step 1: find the logo.
        let Some(overlay) = self.logo_detector.locate(frame)? else {
            tracing::trace!("No overlay found!");
            return Ok(FrameVerdict::Rejected(Rejection::NoOverlay));
        };
        tracing::trace!("Found overlay at {overlay:?}");

        // Step 2: extract the scoring display.
        let (display, top) = extract::match_display(frame, overlay, &self.geometry)?;

        // Step 3: check if this is a match preview
        if extract::is_preview(&display, self.thresholds.preview)? {
            tracing::trace!("Found scoring display, but this is a match preview!");
            return Ok(FrameVerdict::Rejected(Rejection::Preview));
        }

        // Step 4: extract the match name
        let name = extract::extract_name(frame, overlay, &self.geometry, self.match_name_ocr.as_ref())?;
        tracing::trace!("Detected match name: {name:?}");
        if extract::is_placeholder_name(&name, &self.thresholds.placeholder_token) {
            // skip the example match display
            return Ok(FrameVerdict::Rejected(Rejection::PlaceholderName(name)));
        }

        // Step 5: extract the match time
        let time_text = extract::extract_timer(&display, top, &self.geometry, self.match_time_ocr.as_ref())?;
        let Some(time) = extract::parse_timer(&time_text) else {
            return Ok(FrameVerdict::Rejected(Rejection::BadTimer(time_text)));
        };
        tracing::trace!("Detected match time: {time}");

        // Step 6: determine the phase of the match
        let phase = if self.endgame_detector.present(&display, &self.geometry)? {
            MatchPhase::Teleop
        } else {
            MatchPhase::Autonomous
        };
        tracing::trace!("Detected match phase: {phase:?}");

        // Step 7: extract the teams in this match
        let colors_swapped = extract::colors_swapped(&display, &self.geometry, self.thresholds.score_color)?;
        let (left, right) = extract::extract_teams(&display, &self.geometry, self.team_ocr.as_ref())?;
        let (red_teams, blue_teams) = extract::assign_alliances(left, right, colors_swapped);

        Ok(FrameVerdict::Detected(MatchDetection {
            name,
            top,
            phase,
            time,
            red_teams,
            blue_teams,
            colors_swapped,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Size, test_util::*};
    use opencv::{core::Rect, prelude::*};

    const BLUE: [u8; 3] = [0, 148, 255];
    const RED: [u8; 3] = [255, 0, 8];

    struct Fixed(&'static str);

    impl TextRecognizer for Fixed {
        fn extract_text(&self, _img: &Mat) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Reads the left column as one team list and the right column as another.
    struct Columns(std::cell::Cell<usize>);

    impl TextRecognizer for Columns {
        fn extract_text(&self, _img: &Mat) -> anyhow::Result<String> {
            let call = self.0.get();
            self.0.set(call + 1);
            Ok(if call % 2 == 0 { "111 222" } else { "333 444" }.to_string())
        }
    }

    fn logo() -> Mat {
        noise_gray(96, 48, 6, 42)
    }

    fn cap() -> Mat {
        noise_gray(60, 60, 6, 5)
    }

    fn detector(name: &'static str, time: &'static str) -> PowerPlayDetector {
        let geometry = ScaledGeometry::build(1920, 1080);
        let logo_detector = TemplateMatcher::new(&logo(), Size::res_1080p(), Size::res_720p(), 0.8).unwrap();
        let endgame = TemplateMatcher::new(&cap(), Size::res_1080p(), Size::res_720p(), 0.6).unwrap();
        PowerPlayDetector::from_parts(
            geometry,
            logo_detector,
            EndgameMarkerDetector::new(endgame),
            Box::new(Fixed(name)),
            Box::new(Fixed(time)),
            Box::new(Columns(Default::default())),
            (&DetectConfig::default()).into(),
        )
    }

    /// 1080p frame with the overlay logo in the bottom half; the display spans y 864..1044.
    fn frame() -> Mat {
        let mut frame = blank_rgb(1920, 1080);
        paste_gray(&mut frame, &logo(), 300, 816);
        frame
    }

    #[test]
    fn empty_frame_has_no_overlay() {
        let verdict = detector("Qualification 1 of 10", "12").detect(&blank_rgb(1920, 1080)).unwrap();
        assert_eq!(verdict, FrameVerdict::Rejected(Rejection::NoOverlay));
    }

    #[test]
    fn reads_autonomous_frame() {
        let mut frame = frame();
        // left total score box is blue, so colors are not swapped
        fill(&mut frame, Rect::new(647, 864, 212, 123), BLUE);

        let verdict = detector("Qualification 1 of 10", "12").detect(&frame).unwrap();
        assert_eq!(verdict, FrameVerdict::Detected(MatchDetection {
            name: "Qualification 1 of 10".to_string(),
            top: false,
            phase: MatchPhase::Autonomous,
            time: 12,
            red_teams: vec!["333".to_string(), "444".to_string()],
            blue_teams: vec!["111".to_string(), "222".to_string()],
            colors_swapped: false,
        }));
    }

    #[test]
    fn caps_mean_teleop() {
        let mut frame = frame();
        paste_gray(&mut frame, &cap(), 399, 900);

        let FrameVerdict::Detected(detection) = detector("Qualification 1 of 10", "95").detect(&frame).unwrap() else {
            panic!("expected a detection");
        };
        assert_eq!(detection.phase, MatchPhase::Teleop);
        assert_eq!(detection.time, 95);
        // nothing blue in the score box
        assert!(detection.colors_swapped);
        assert_eq!(detection.red_teams, vec!["111", "222"]);
    }

    #[test]
    fn rejects_preview_placeholder_and_bad_timer() {
        let mut preview = frame();
        fill(&mut preview, Rect::new(0, 864, 960, 180), RED);
        fill(&mut preview, Rect::new(960, 864, 960, 180), BLUE);
        assert_eq!(
            detector("Qualification 1 of 10", "12").detect(&preview).unwrap(),
            FrameVerdict::Rejected(Rejection::Preview)
        );

        assert_eq!(
            detector("Example Match", "12").detect(&frame()).unwrap(),
            FrameVerdict::Rejected(Rejection::PlaceholderName("Example Match".to_string()))
        );

        assert_eq!(
            detector("Qualification 1 of 10", "I2").detect(&frame()).unwrap(),
            FrameVerdict::Rejected(Rejection::BadTimer("I2".to_string()))
        );
    }
}
