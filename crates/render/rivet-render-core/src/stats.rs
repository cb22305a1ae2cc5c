use std::collections::VecDeque;
use std::time::Instant;

const WINDOW: usize = 10;

/// Frame count plus a rolling frame rate over the last few intervals.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    frames: u64,
    last: Option<Instant>,
    intervals: VecDeque<f32>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Instant) {
        self.frames += 1;
        if let Some(last) = self.last.replace(at) {
            if self.intervals.len() == WINDOW {
                self.intervals.pop_front();
            }
            self.intervals
                .push_back(at.saturating_duration_since(last).as_secs_f32());
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames per second over the window; `None` before two frames.
    pub fn average_fps(&self) -> Option<f32> {
        if self.intervals.is_empty() {
            return None;
        }
        let total: f32 = self.intervals.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(self.intervals.len() as f32 / total)
    }
}
