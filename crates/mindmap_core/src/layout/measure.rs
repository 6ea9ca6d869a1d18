//! Text-driven box measurement.
//!
//! This is the only place text metrics enter layout: line count sets the
//! height, the longest line sets the width.

use crate::config::LayoutConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("valid line split regex"));

/// Measured size of one topic box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

/// Measures the box for `text`.
///
/// Empty text still yields one line at the minimum width.
pub fn measure_text(text: &str, config: &LayoutConfig) -> BoxSize {
    let mut line_count = 0usize;
    let mut longest = 0usize;
    for line in LINE_SPLIT_RE.split(text) {
        line_count += 1;
        longest = longest.max(line.chars().count());
    }
    let line_count = line_count.max(1);

    let width = (longest as f64 * config.char_width + 2.0 * config.padding_x)
        .max(config.min_box_width);
    let height = line_count as f64 * config.line_height + 2.0 * config.padding_y;
    BoxSize { width, height }
}
