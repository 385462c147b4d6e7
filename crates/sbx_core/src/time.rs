use std::time::{Duration, Instant};

const FPS_SAMPLE_COUNT: usize = 60;

/// Longest frame delta fed into the smoothing window. Longer gaps (a debugger
/// break, a suspended laptop) are clamped so stats recover quickly.
const MAX_FRAME_DT: f64 = 0.25;

/// Wall-clock bookkeeping for the display-frame loop: one `begin_frame()` per
/// frame, optional pacing to a target rate, smoothed FPS for logs.
pub struct FrameClock {
    pub target_dt: Option<f64>,
    pub frame_count: u64,
    pub total_time: f64,
    pub real_dt: f64,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    /// A clock that never asks the caller to wait.
    pub fn unpaced() -> Self {
        Self::with_target(None)
    }

    pub fn with_target_fps(fps: u32) -> Self {
        if fps == 0 {
            return Self::unpaced();
        }
        Self::with_target(Some(1.0 / fps as f64))
    }

    fn with_target(target_dt: Option<f64>) -> Self {
        let seed = target_dt.unwrap_or(1.0 / 60.0);
        Self {
            target_dt,
            frame_count: 0,
            total_time: 0.0,
            real_dt: 0.0,
            last_instant: Instant::now(),
            fps_samples: [seed; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 1.0 / seed,
            smoothed_frame_time_ms: seed * 1000.0,
        }
    }

    pub fn begin_frame(&mut self) {
        self.begin_frame_at(Instant::now());
    }

    pub fn begin_frame_at(&mut self, now: Instant) {
        self.real_dt = now.saturating_duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;

        if self.real_dt > MAX_FRAME_DT {
            log::warn!(
                "Frame took {:.1}ms, clamping to {}ms for stats",
                self.real_dt * 1000.0,
                MAX_FRAME_DT * 1000.0
            );
            self.real_dt = MAX_FRAME_DT;
        }

        self.total_time += self.real_dt;
        self.frame_count += 1;

        self.fps_samples[self.fps_sample_index] = self.real_dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }

    /// How long the caller should wait before the next frame is due.
    /// `None` for an unpaced clock or when the frame already overran.
    pub fn remaining_budget(&self) -> Option<Duration> {
        self.remaining_budget_at(Instant::now())
    }

    pub fn remaining_budget_at(&self, now: Instant) -> Option<Duration> {
        let target = Duration::from_secs_f64(self.target_dt?);
        let spent = now.saturating_duration_since(self.last_instant);
        target.checked_sub(spent).filter(|left| !left.is_zero())
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::unpaced()
    }
}
