//! Explicit engine context.
//!
//! A [`Runtime`] is created once per engine and passed to everything that
//! needs to create native objects. Several runtimes may coexist in one
//! process, which is what keeps tests isolated from each other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::NativeEngine;
use crate::file::File;
use crate::renderer::Renderer;
use crate::types::RendererType;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Renderer used when a caller does not ask for a specific one.
    pub default_renderer: RendererType,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug)]
struct RuntimeInner {
    engine: Arc<dyn NativeEngine>,
    config: RuntimeConfig,
}

#[derive(Clone, Debug)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self::with_config(engine, RuntimeConfig::default())
    }

    pub fn with_config(engine: Arc<dyn NativeEngine>, config: RuntimeConfig) -> Self {
        log::debug!(
            "runtime initialised (default renderer: {})",
            config.default_renderer.name()
        );
        Self {
            inner: Arc::new(RuntimeInner { engine, config }),
        }
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.inner.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn default_renderer(&self) -> RendererType {
        self.inner.config.default_renderer
    }

    /// Imports file bytes. Shorthand for [`File::import`].
    pub fn load_file(&self, bytes: &[u8]) -> Result<File> {
        File::import(self, bytes)
    }

    pub fn make_renderer(&self, renderer: RendererType) -> Result<Renderer> {
        Renderer::make(self, renderer)
    }
}
