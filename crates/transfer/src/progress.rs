use std::time::{Duration, Instant};

use walioss_protocol::TransferUpdate;

use crate::parser::ParsedProgress;

// ---------------------------------------------------------------------------
// ProgressState
// ---------------------------------------------------------------------------

/// Latest progress of one job, accumulated from parsed output lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    total_bytes: u64,
    done_bytes: u64,
    speed_bps: f64,
}

impl ProgressState {
    /// Creates an empty state. `total_bytes` of 0 means the size is unknown.
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            done_bytes: 0,
            speed_bps: 0.0,
        }
    }

    /// Folds one parsed line into the state.
    ///
    /// An absolute byte count wins over a percentage; a percentage is only
    /// usable when the total is known. `done_bytes` never decreases and never
    /// exceeds a known total. Returns whether the line carried progress.
    pub fn apply(&mut self, parsed: &ParsedProgress) -> bool {
        let done = match (parsed.done_bytes, parsed.percent) {
            (Some(bytes), _) => Some(bytes),
            (None, Some(percent)) if self.total_bytes > 0 => {
                Some((self.total_bytes as f64 * (percent / 100.0)).max(0.0) as u64)
            }
            _ => None,
        };

        if let Some(done) = done {
            let done = if self.total_bytes > 0 {
                done.min(self.total_bytes)
            } else {
                done
            };
            self.done_bytes = self.done_bytes.max(done);
        }

        if let Some(speed) = parsed.speed_bps {
            self.speed_bps = speed.max(0.0);
        }

        parsed.is_progress()
    }

    /// Seconds remaining at the current speed, or 0 when unknown.
    pub fn eta_seconds(&self) -> u64 {
        if self.total_bytes == 0 || self.speed_bps <= 0.0 || self.done_bytes > self.total_bytes {
            return 0;
        }
        ((self.total_bytes - self.done_bytes) as f64 / self.speed_bps) as u64
    }

    /// Marks the transfer as fully done when the total is known.
    pub fn complete(&mut self) {
        if self.total_bytes > 0 {
            self.done_bytes = self.total_bytes;
        }
    }

    /// Copies counters, speed and ETA into a snapshot.
    pub fn write_to(&self, update: &mut TransferUpdate) {
        update.done_bytes = self.done_bytes;
        update.speed_bytes_per_sec = self.speed_bps;
        update.eta_seconds = self.eta_seconds();
    }

    pub fn done_bytes(&self) -> u64 {
        self.done_bytes
    }

    pub fn speed_bps(&self) -> f64 {
        self.speed_bps
    }
}

// ---------------------------------------------------------------------------
// EmitThrottle
// ---------------------------------------------------------------------------

/// Rate limiter for outbound snapshots.
///
/// Allows one emission per `interval`; forced emissions always pass and
/// restart the interval.
#[derive(Debug, Clone)]
pub struct EmitThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl EmitThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Decides whether a snapshot may be emitted at `now`, recording it if so.
    pub fn should_emit(&mut self, now: Instant, force: bool) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if force || due {
            self.last_emit = Some(now);
            return true;
        }
        false
    }
}
