//! Progress extraction from tool output lines.

use std::sync::LazyLock;

use regex::Regex;

static OK_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOK\s*size:\s*([0-9][0-9,]*)(?:\b|$)").expect("valid regex"));
static PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bProgress:\s*([0-9]+(?:\.[0-9]+)?)\s*%").expect("valid regex"));
static SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSpeed:\s*([0-9]+(?:\.[0-9]+)?)\s*([kmgtp]?)i?b/s").expect("valid regex")
});
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("valid regex"));

/// Fields found on one output line. Each is extracted independently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedProgress {
    /// Cumulative bytes transferred.
    pub done_bytes: Option<u64>,
    /// Completion percentage as printed (not clamped).
    pub percent: Option<f64>,
    /// Instantaneous rate in bytes per second.
    pub speed_bps: Option<f64>,
}

impl ParsedProgress {
    /// Whether any field matched. Lines without a match are diagnostics.
    pub fn is_progress(&self) -> bool {
        self.done_bytes.is_some() || self.percent.is_some() || self.speed_bps.is_some()
    }
}

/// Classifies tool output lines.
///
/// Each external tool gets its own implementation; the rest of the pipeline
/// only sees [`ParsedProgress`].
pub trait ProgressLineParser: Send + Sync {
    fn parse(&self, line: &str) -> ParsedProgress;
}

/// Parser for `ossutil cp` output.
///
/// Recognizes `OK size: 1,048,576`, `Progress: 45.5%` and
/// `Speed: 2.50MB/s`, case-insensitively, after removing ANSI escapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OssutilProgressParser;

impl ProgressLineParser for OssutilProgressParser {
    fn parse(&self, line: &str) -> ParsedProgress {
        let clean = strip_ansi(line);
        let clean = clean.trim();
        let mut out = ParsedProgress::default();

        if let Some(caps) = OK_SIZE.captures(clean) {
            out.done_bytes = caps[1].replace(',', "").parse().ok();
        }

        if let Some(caps) = PROGRESS.captures(clean) {
            out.percent = caps[1].parse().ok();
        }

        if let Some(caps) = SPEED.captures(clean) {
            if let Ok(value) = caps[1].parse::<f64>() {
                out.speed_bps = Some(speed_to_bps(value, &caps[2]));
            }
        }

        out
    }
}

/// Removes CSI escape sequences (`ESC [ params intermediates final`).
pub fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(s, "")
}

/// Scales `value` by a binary unit prefix (`K` = 2^10 … `P` = 2^50).
///
/// An empty or unknown prefix means plain bytes.
pub fn speed_to_bps(value: f64, prefix: &str) -> f64 {
    let shift = match prefix.to_ascii_uppercase().as_str() {
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        "P" => 50,
        _ => 0,
    };
    value * (1u64 << shift) as f64
}
