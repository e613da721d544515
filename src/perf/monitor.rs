//! Frame-rate sampling with a sticky performance-mode flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

/// Performance mode turns on below this frame rate
pub const ENTER_PERFORMANCE_MODE_FPS: u32 = 20;
/// and turns back off above this one.
pub const EXIT_PERFORMANCE_MODE_FPS: u32 = 40;
/// Minimum window over which a frame rate is computed
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

const NOMINAL_FPS: u32 = 60;

/// Resource budget derived from the current frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub should_reduce_detail: bool,
    pub max_visible_points: usize,
    pub should_disable_animations: bool,
}

impl Recommendations {
    pub fn for_fps(fps: u32) -> Self {
        if fps < 15 {
            Self {
                should_reduce_detail: true,
                max_visible_points: 500,
                should_disable_animations: true,
            }
        } else if fps < 30 {
            Self {
                should_reduce_detail: true,
                max_visible_points: 2000,
                should_disable_animations: false,
            }
        } else {
            Self {
                should_reduce_detail: false,
                max_visible_points: 5000,
                should_disable_animations: false,
            }
        }
    }
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub fps: u32,
    pub performance_mode: bool,
    pub recommendations: Recommendations,
}

impl PerformanceSnapshot {
    pub fn with_fps(fps: u32, performance_mode: bool) -> Self {
        Self {
            fps,
            performance_mode,
            recommendations: Recommendations::for_fps(fps),
        }
    }

    /// Snapshot of an unloaded renderer
    pub fn nominal() -> Self {
        Self::with_fps(NOMINAL_FPS, false)
    }

    /// Feature budget for one hex layer: half the visible-point budget in
    /// performance mode, `default` otherwise
    pub fn max_features(&self, default: usize) -> usize {
        if self.performance_mode {
            self.recommendations.max_visible_points / 2
        } else {
            default
        }
    }
}

impl Default for PerformanceSnapshot {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Debug)]
struct MonitorInner {
    fps: u32,
    performance_mode: bool,
    window_start: Instant,
    frames_at_window_start: u64,
}

/// Counts rendered frames and turns them into a frame rate once per window.
///
/// Frames are recorded lock-free from the render path; sampling takes the
/// lock.
#[derive(Debug)]
pub struct PerformanceMonitor {
    frames: AtomicU64,
    inner: Mutex<MonitorInner>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            frames: AtomicU64::new(0),
            inner: Mutex::new(MonitorInner {
                fps: NOMINAL_FPS,
                performance_mode: false,
                window_start: start,
                frames_at_window_start: 0,
            }),
        }
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames(&self, count: u64) {
        self.frames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn sample(&self) -> Option<u32> {
        self.sample_at(Instant::now())
    }

    /// Close the current window if at least [`SAMPLE_WINDOW`] has elapsed,
    /// returning the measured frame rate.
    pub fn sample_at(&self, now: Instant) -> Option<u32> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let elapsed = now.saturating_duration_since(inner.window_start);
        if elapsed < SAMPLE_WINDOW {
            return None;
        }

        let frames = self.frames.load(Ordering::Relaxed);
        let window_frames = frames.saturating_sub(inner.frames_at_window_start);
        let fps = ((window_frames as f64 * 1000.0) / elapsed.as_millis() as f64).round() as u32;

        inner.fps = fps;
        inner.window_start = now;
        inner.frames_at_window_start = frames;

        if fps < ENTER_PERFORMANCE_MODE_FPS && !inner.performance_mode {
            info!("Frame rate dropped to {} fps, entering performance mode", fps);
            inner.performance_mode = true;
        } else if fps > EXIT_PERFORMANCE_MODE_FPS && inner.performance_mode {
            info!("Frame rate recovered to {} fps, leaving performance mode", fps);
            inner.performance_mode = false;
        } else {
            debug!("Sampled {} fps", fps);
        }

        Some(fps)
    }

    /// Manual override of the performance-mode flag
    pub fn set_performance_mode(&self, enabled: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.performance_mode = enabled;
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        PerformanceSnapshot::with_fps(inner.fps, inner.performance_mode)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(monitor: &PerformanceMonitor, start: &mut Instant, frames: u64) -> u32 {
        monitor.record_frames(frames);
        *start += SAMPLE_WINDOW;
        monitor.sample_at(*start).unwrap()
    }

    #[test]
    fn test_no_sample_before_window() {
        let start = Instant::now();
        let monitor = PerformanceMonitor::starting_at(start);
        monitor.record_frames(30);
        assert_eq!(monitor.sample_at(start + Duration::from_millis(500)), None);
        assert_eq!(monitor.snapshot().fps, 60);
    }

    #[test]
    fn test_fps_over_longer_window() {
        let start = Instant::now();
        let monitor = PerformanceMonitor::starting_at(start);
        monitor.record_frames(90);
        assert_eq!(monitor.sample_at(start + Duration::from_secs(2)), Some(45));
    }

    #[test]
    fn test_hysteresis() {
        let mut now = Instant::now();
        let monitor = PerformanceMonitor::starting_at(now);

        assert_eq!(window(&monitor, &mut now, 18), 18);
        assert!(monitor.snapshot().performance_mode);

        // Inside the band: sticky
        window(&monitor, &mut now, 35);
        assert!(monitor.snapshot().performance_mode);
        window(&monitor, &mut now, 40);
        assert!(monitor.snapshot().performance_mode);

        window(&monitor, &mut now, 41);
        assert!(!monitor.snapshot().performance_mode);

        // Inside the band from the other side: stays off
        window(&monitor, &mut now, 20);
        assert!(!monitor.snapshot().performance_mode);
    }

    #[test]
    fn test_recommendation_tiers() {
        assert_eq!(Recommendations::for_fps(10).max_visible_points, 500);
        assert!(Recommendations::for_fps(14).should_disable_animations);
        assert_eq!(Recommendations::for_fps(15).max_visible_points, 2000);
        assert!(!Recommendations::for_fps(29).should_disable_animations);
        assert_eq!(Recommendations::for_fps(30).max_visible_points, 5000);
        assert!(!Recommendations::for_fps(60).should_reduce_detail);
    }

    #[test]
    fn test_max_features_budget() {
        assert_eq!(PerformanceSnapshot::nominal().max_features(2000), 2000);
        assert_eq!(PerformanceSnapshot::with_fps(10, true).max_features(2000), 250);
        assert_eq!(PerformanceSnapshot::with_fps(25, true).max_features(2000), 1000);
    }
}
