use std::time::Duration;

use serde::{Deserialize, Serialize};

use rivet_runtime_core::RendererType;

use crate::backend::{HeadlessBackend, NativeBackend, RenderBackend};

/// Which [`RenderBackend`] a loop is built with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendKind {
    /// Engine renderer; `None` uses the runtime's default renderer type.
    Native {
        #[serde(default)]
        renderer: Option<RendererType>,
    },
    Headless,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Native { renderer: None }
    }
}

impl BackendKind {
    pub fn build(&self) -> Box<dyn RenderBackend> {
        match self {
            BackendKind::Native { renderer } => Box::new(NativeBackend::new(*renderer)),
            BackendKind::Headless => Box::new(HeadlessBackend::new()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub backend: BackendKind,
    pub frame_interval_ms: u64,
    pub worker_name: String,
    /// Stop ticking after a frame fails.
    pub halt_on_error: bool,
    /// Log every frame at debug level.
    pub trace: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            frame_interval_ms: 16,
            worker_name: "rivet-render".to_string(),
            halt_on_error: true,
            trace: false,
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn headless() -> Self {
        Self {
            backend: BackendKind::Headless,
            ..Self::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
