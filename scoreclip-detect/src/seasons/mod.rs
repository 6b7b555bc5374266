//! Per-season scoreboard detectors. Each season's overlay has its own logo and sprites.

pub mod s2022_powerplay;
