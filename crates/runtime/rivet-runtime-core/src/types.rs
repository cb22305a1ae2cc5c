//! Plain value types that cross the engine boundary.

use serde::{Deserialize, Serialize};

/// How a timeline behaves when it reaches the end of its range.
///
/// `Auto` means "keep whatever the animation was authored with" and is only
/// meaningful as an override request, never as an instance's actual mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Loop {
    OneShot,
    Loop,
    PingPong,
    #[default]
    Auto,
}

/// Playback direction. `Auto` keeps the instance's current direction.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Backwards,
    Forwards,
    #[default]
    Auto,
}

impl Direction {
    /// Signed multiplier applied to elapsed time. `Auto` maps to 0.
    pub fn value(&self) -> i8 {
        match self {
            Direction::Backwards => -1,
            Direction::Forwards => 1,
            Direction::Auto => 0,
        }
    }

    pub fn from_value(value: i8) -> Self {
        match value {
            v if v < 0 => Direction::Backwards,
            0 => Direction::Auto,
            _ => Direction::Forwards,
        }
    }
}

/// What happened during a single advance of a linear animation instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvanceResult {
    /// Time did not move and no boundary was crossed.
    None,
    /// Time moved without crossing a boundary.
    Advanced,
    OneShot,
    Loop,
    PingPong,
}

impl AdvanceResult {
    /// Result reported when an instance with `mode` crosses a boundary.
    pub fn boundary(mode: Loop) -> Self {
        match mode {
            Loop::OneShot => AdvanceResult::OneShot,
            Loop::Loop => AdvanceResult::Loop,
            Loop::PingPong => AdvanceResult::PingPong,
            Loop::Auto => AdvanceResult::Advanced,
        }
    }

    /// Combines the engine's `did_loop`/`keep_going` flags into a result.
    pub fn resolve(mode: Loop, did_loop: bool, keep_going: bool) -> Self {
        if did_loop {
            Self::boundary(mode)
        } else if keep_going {
            AdvanceResult::Advanced
        } else {
            AdvanceResult::None
        }
    }

    /// The loop mode that was crossed, if any.
    pub fn looped(&self) -> Option<Loop> {
        match self {
            AdvanceResult::OneShot => Some(Loop::OneShot),
            AdvanceResult::Loop => Some(Loop::Loop),
            AdvanceResult::PingPong => Some(Loop::PingPong),
            AdvanceResult::None | AdvanceResult::Advanced => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Fit {
    Fill,
    #[default]
    Contain,
    Cover,
    FitWidth,
    FitHeight,
    None,
    ScaleDown,
    Layout,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Axis-aligned bounds in artboard space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayableKind {
    Animation,
    StateMachine,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Trigger,
    Boolean,
    Number,
}

/// A value written to (or read from) a state machine input.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputValue {
    Trigger,
    Boolean(bool),
    Number(f32),
}

impl InputValue {
    pub fn kind(&self) -> InputKind {
        match self {
            InputValue::Trigger => InputKind::Trigger,
            InputValue::Boolean(_) => InputKind::Boolean,
            InputValue::Number(_) => InputKind::Number,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    pub name: String,
    pub kind: InputKind,
}

/// A view model property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyValue {
    Number(f32),
    String(String),
    Boolean(bool),
    Trigger,
}

/// An event a state machine reported while advancing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportedEvent {
    pub name: String,
    /// Seconds between the event firing and the end of the advance that reported it.
    #[serde(default)]
    pub delay_seconds: f32,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Read-only view of a linear animation instance's playback fields.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSnapshot {
    pub name: String,
    pub time: f32,
    pub direction: Direction,
    pub loop_mode: Loop,
    pub fps: u32,
    /// Duration in frames.
    pub duration: u32,
    pub start_time: f32,
    pub end_time: f32,
}

/// Native renderer implementations the engine can provide.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RendererType {
    Canvas,
    Skia,
    #[default]
    Rive,
}

impl RendererType {
    pub fn name(&self) -> &'static str {
        match self {
            RendererType::Canvas => "canvas",
            RendererType::Skia => "skia",
            RendererType::Rive => "rive",
        }
    }
}

/// Identity and size of a platform drawing target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SurfaceInfo {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Layout parameters for a single draw call.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawParams {
    pub fit: Fit,
    pub alignment: Alignment,
    pub scale_factor: f32,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            fit: Fit::default(),
            alignment: Alignment::default(),
            scale_factor: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_result_prefers_loop_over_keep_going() {
        assert_eq!(
            AdvanceResult::resolve(Loop::OneShot, true, false),
            AdvanceResult::OneShot
        );
        assert_eq!(
            AdvanceResult::resolve(Loop::PingPong, true, true),
            AdvanceResult::PingPong
        );
        assert_eq!(
            AdvanceResult::resolve(Loop::Loop, false, true),
            AdvanceResult::Advanced
        );
        assert_eq!(
            AdvanceResult::resolve(Loop::OneShot, false, false),
            AdvanceResult::None
        );
    }

    #[test]
    fn direction_values() {
        assert_eq!(Direction::Backwards.value(), -1);
        assert_eq!(Direction::from_value(1), Direction::Forwards);
        assert_eq!(Direction::from_value(-3), Direction::Backwards);
    }

    #[test]
    fn loop_serializes_camel_case() {
        let json = serde_json::to_string(&Loop::PingPong).unwrap();
        assert_eq!(json, "\"pingPong\"");
        let parsed: Loop = serde_json::from_str("\"oneShot\"").unwrap();
        assert_eq!(parsed, Loop::OneShot);
    }
}
