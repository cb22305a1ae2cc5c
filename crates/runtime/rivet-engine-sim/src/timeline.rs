//! Linear timeline advance: direction, speed, work area and loop handling.

use rivet_runtime_core::{AdvanceResult, AnimationSnapshot, Direction, Loop};

use crate::document::AnimationDoc;

#[derive(Clone, Debug)]
pub(crate) struct Timeline {
    name: String,
    fps: u32,
    duration: u32,
    speed: f32,
    work_start: Option<u32>,
    work_end: Option<u32>,
    pub(crate) loop_mode: Loop,
    pub(crate) time: f32,
    /// +1 or -1.
    direction: f32,
}

impl Timeline {
    pub(crate) fn new(doc: &AnimationDoc) -> Self {
        let mut timeline = Self {
            name: doc.name.clone(),
            fps: doc.fps.max(1),
            duration: doc.duration,
            speed: doc.speed,
            work_start: doc.work_start,
            work_end: doc.work_end,
            loop_mode: if doc.loop_mode == Loop::Auto {
                Loop::OneShot
            } else {
                doc.loop_mode
            },
            time: 0.0,
            direction: 1.0,
        };
        timeline.time = timeline.start_time();
        timeline
    }

    fn start_frame(&self) -> f32 {
        self.work_start.unwrap_or(0) as f32
    }

    fn end_frame(&self) -> f32 {
        self.work_end.unwrap_or(self.duration) as f32
    }

    pub(crate) fn start_time(&self) -> f32 {
        self.start_frame() / self.fps as f32
    }

    pub(crate) fn end_time(&self) -> f32 {
        self.end_frame() / self.fps as f32
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Forwards => self.direction = 1.0,
            Direction::Backwards => self.direction = -1.0,
            Direction::Auto => {}
        }
    }

    pub(crate) fn set_loop(&mut self, mode: Loop) {
        if mode != Loop::Auto {
            self.loop_mode = mode;
        }
    }

    pub(crate) fn snapshot(&self) -> AnimationSnapshot {
        AnimationSnapshot {
            name: self.name.clone(),
            time: self.time,
            direction: Direction::from_value(self.direction as i8),
            loop_mode: self.loop_mode,
            fps: self.fps,
            duration: self.duration,
            start_time: self.start_time(),
            end_time: self.end_time(),
        }
    }

    pub(crate) fn advance(&mut self, elapsed: f32) -> AdvanceResult {
        let fps = self.fps as f32;
        let start = self.start_frame();
        let end = self.end_frame();
        let range = end - start;

        let before = self.time * fps;
        self.time += elapsed * self.speed * self.direction;
        let mut frames = self.time * fps;

        let mut keep_going = true;
        let mut did_loop = false;
        let forwards = self.direction > 0.0;

        match self.loop_mode {
            Loop::OneShot | Loop::Auto => {
                if forwards && frames >= end {
                    keep_going = false;
                    // Only the advance that reaches the end reports it.
                    did_loop = before < end;
                    frames = end;
                } else if !forwards && frames <= start {
                    keep_going = false;
                    did_loop = before > start;
                    frames = start;
                }
            }
            Loop::Loop if range > 0.0 => {
                if forwards && frames >= end {
                    frames = start + (frames - start).rem_euclid(range);
                    did_loop = true;
                } else if !forwards && frames <= start {
                    frames = end - (start - frames).rem_euclid(range);
                    did_loop = true;
                }
            }
            Loop::PingPong if range > 0.0 => loop {
                if self.direction > 0.0 && frames >= end {
                    frames = end - (frames - end);
                    self.direction = -1.0;
                    did_loop = true;
                } else if self.direction < 0.0 && frames < start {
                    frames = start + (start - frames);
                    self.direction = 1.0;
                    did_loop = true;
                } else {
                    break;
                }
            },
            Loop::Loop | Loop::PingPong => {
                frames = start;
                keep_going = false;
            }
        }

        self.time = frames / fps;
        AdvanceResult::resolve(self.loop_mode, did_loop, keep_going)
    }
}
