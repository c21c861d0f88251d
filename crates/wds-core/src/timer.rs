//! Per-page stopwatch.

use std::time::{Duration, Instant};

/// Elapsed-time counter that can be frozen once.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
    stopped: Option<Instant>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

impl Stopwatch {
    /// Start counting now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            stopped: None,
        }
    }

    /// Freeze the elapsed time. Later calls keep the first stop.
    pub fn stop(&mut self) {
        if self.stopped.is_none() {
            self.stopped = Some(Instant::now());
        }
    }

    /// Whether the stopwatch is still counting.
    pub fn is_running(&self) -> bool {
        self.stopped.is_none()
    }

    /// Time since start, or until stop if stopped.
    pub fn elapsed(&self) -> Duration {
        self.stopped
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }

    /// Elapsed time as `HH:MM:SS`.
    pub fn display(&self) -> String {
        format_hms(self.elapsed())
    }
}

/// Format a duration as `HH:MM:SS`, truncating sub-second parts.
///
/// Hours are not wrapped, so a very long session shows e.g. `26:03:09`.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        insta::assert_snapshot!(format_hms(Duration::ZERO), @"00:00:00");
        insta::assert_snapshot!(format_hms(Duration::from_millis(61_999)), @"00:01:01");
        insta::assert_snapshot!(format_hms(Duration::from_secs(3 * 3600 + 25 * 60 + 7)), @"03:25:07");
        insta::assert_snapshot!(format_hms(Duration::from_secs(26 * 3600)), @"26:00:00");
    }

    #[test]
    fn stop_freezes_elapsed() {
        let mut watch = Stopwatch::start();
        watch.stop();
        let frozen = watch.elapsed();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(watch.elapsed(), frozen);
        assert!(!watch.is_running());
    }

    #[test]
    fn second_stop_is_ignored() {
        let mut watch = Stopwatch::start();
        watch.stop();
        let first = watch.elapsed();
        std::thread::sleep(Duration::from_millis(10));
        watch.stop();
        assert_eq!(watch.elapsed(), first);
    }
}
