//! Progress reporting for long-running transforms.
//!
//! Reports are throttled on two axes: at least a gibibyte of new data must
//! have been processed since the last report, and at least a minute must
//! have passed. Estimates are rendered as "N unit(s) left", escalating the
//! unit from seconds through days as the estimate grows.

use std::time::Instant;

/// Bytes that must accumulate between reports.
const REPORT_BYTES: u64 = 1024 * 1024 * 1024;

/// Seconds that must elapse between reports.
const REPORT_SECS: u64 = 60;

/// Tracks throughput for one run and emits throttled estimates to stderr.
pub struct ProgressMeter {
    /// Bytes this run still had to process when it started.
    total: u64,
    processed: u64,
    reported_at_bytes: u64,
    started: Instant,
    last_report: Instant,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            processed: 0,
            reported_at_bytes: 0,
            started: now,
            last_report: now,
        }
    }

    /// Records `bytes` of progress, emitting a report when both throttles
    /// allow it.
    pub fn record(&mut self, bytes: u64) {
        self.processed += bytes;

        if self.processed - self.reported_at_bytes < REPORT_BYTES {
            return;
        }
        self.reported_at_bytes = self.processed;

        let now = Instant::now();
        if now.duration_since(self.last_report).as_secs() < REPORT_SECS {
            return;
        }
        self.last_report = now;

        if let Some(line) = self.estimate(now) {
            eprintln!("{}", line);
        }
    }

    fn estimate(&self, now: Instant) -> Option<String> {
        let elapsed = now.duration_since(self.started).as_secs_f64();
        if self.processed == 0 || elapsed <= 0.0 {
            return None;
        }
        let rate = self.processed as f64 / elapsed;
        let remaining = self.total.saturating_sub(self.processed) as f64;
        let (value, unit) = scale_time_left(remaining / rate);
        Some(format!("{:.1} {} left", value, unit))
    }
}

/// Escalates a seconds estimate through minutes, hours, and days.
///
/// Thresholds follow the reporting convention: over 100 seconds becomes
/// minutes, over 90 minutes becomes hours, over 30 hours becomes days.
pub fn scale_time_left(seconds: f64) -> (f64, &'static str) {
    let mut left = seconds;
    let mut unit = "second(s)";
    if left > 100.0 {
        left /= 60.0;
        unit = "minute(s)";
        if left > 90.0 {
            left /= 60.0;
            unit = "hour(s)";
            if left > 30.0 {
                left /= 24.0;
                unit = "day(s)";
            }
        }
    }
    (left, unit)
}
