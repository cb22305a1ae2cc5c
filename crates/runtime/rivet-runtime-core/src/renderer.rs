use crate::context::Runtime;
use crate::error::RuntimeError;
use crate::handle::{native_object, HandleKind, NativeHandle};
use crate::types::{RendererType, SurfaceInfo};
use crate::Result;

/// Native renderer object. Starts its own handle graph.
#[derive(Clone, Debug)]
pub struct Renderer {
    handle: NativeHandle,
    renderer_type: RendererType,
}

native_object!(Renderer);

impl Renderer {
    pub fn make(runtime: &Runtime, renderer_type: RendererType) -> Result<Self> {
        let engine = runtime.engine();
        let ptr = engine
            .make_renderer(renderer_type)
            .ok_or_else(|| RuntimeError::RendererUnavailable {
                renderer: renderer_type.name().to_string(),
            })?;
        Ok(Self {
            handle: NativeHandle::root(HandleKind::Renderer, engine.clone(), ptr),
            renderer_type,
        })
    }

    pub fn renderer_type(&self) -> RendererType {
        self.renderer_type
    }

    /// Points the renderer at a new drawing target, or detaches it.
    pub fn bind_surface(&self, surface: Option<SurfaceInfo>) -> Result<()> {
        self.handle
            .with_object(|engine, ptr| engine.bind_surface(ptr, surface))
    }
}
