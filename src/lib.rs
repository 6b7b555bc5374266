//! Finds where each match starts and ends in an event recording.
//!
//! [`pass1`] samples the video and reads the scoreboard overlay off every sampled frame;
//! [`pass2`] groups those readings by match and works out each match's time range.

pub mod config;
pub mod model;
pub mod pass1;
pub mod pass2;
