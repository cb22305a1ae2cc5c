//! Render backends.
//!
//! A backend owns whatever native state drawing needs. It is created and
//! used only on the render worker; the loop calls `make` once, then
//! `bind_surface` and `draw` per frame, and `delete` on teardown.

use rivet_runtime_core::{
    Artboard, DrawParams, HandleKind, NativeObject, Renderer, RendererType, Result, Runtime,
    RuntimeError, SurfaceInfo,
};

pub trait RenderBackend: Send {
    /// `None` until a native renderer type has been decided.
    fn renderer_type(&self) -> Option<RendererType>;

    fn make(&mut self, runtime: &Runtime) -> Result<()>;

    fn has_object(&self) -> bool;

    fn bind_surface(&mut self, surface: Option<SurfaceInfo>) -> Result<()>;

    fn draw(&mut self, artboard: &Artboard, params: &DrawParams) -> Result<()>;

    /// Releases native state. Calling it again is a no-op.
    fn delete(&mut self) -> Result<()>;
}

fn disposed_renderer() -> RuntimeError {
    RuntimeError::UseAfterDispose {
        kind: HandleKind::Renderer,
    }
}

/// Draws through an engine [`Renderer`].
#[derive(Debug, Default)]
pub struct NativeBackend {
    requested: Option<RendererType>,
    renderer: Option<Renderer>,
}

impl NativeBackend {
    pub fn new(requested: Option<RendererType>) -> Self {
        Self {
            requested,
            renderer: None,
        }
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }
}

impl RenderBackend for NativeBackend {
    fn renderer_type(&self) -> Option<RendererType> {
        self.renderer
            .as_ref()
            .map(Renderer::renderer_type)
            .or(self.requested)
    }

    fn make(&mut self, runtime: &Runtime) -> Result<()> {
        if self.renderer.is_some() {
            return Ok(());
        }
        let renderer_type = self.requested.unwrap_or_else(|| runtime.default_renderer());
        self.renderer = Some(Renderer::make(runtime, renderer_type)?);
        log::debug!("{} renderer made", renderer_type.name());
        Ok(())
    }

    fn has_object(&self) -> bool {
        self.renderer.as_ref().is_some_and(|r| r.has_object())
    }

    fn bind_surface(&mut self, surface: Option<SurfaceInfo>) -> Result<()> {
        let renderer = self.renderer.as_ref().ok_or_else(disposed_renderer)?;
        renderer.bind_surface(surface)
    }

    fn draw(&mut self, artboard: &Artboard, params: &DrawParams) -> Result<()> {
        let renderer = self.renderer.as_ref().ok_or_else(disposed_renderer)?;
        artboard.draw(renderer, params)
    }

    fn delete(&mut self) -> Result<()> {
        match self.renderer.take() {
            Some(renderer) => renderer.release().map(|_| ()),
            None => Ok(()),
        }
    }
}

/// Validates each artboard it is asked to draw and counts frames, without
/// a native renderer.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    made: bool,
    surface: Option<SurfaceInfo>,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> Option<SurfaceInfo> {
        self.surface
    }
}

impl RenderBackend for HeadlessBackend {
    fn renderer_type(&self) -> Option<RendererType> {
        None
    }

    fn make(&mut self, _runtime: &Runtime) -> Result<()> {
        self.made = true;
        Ok(())
    }

    fn has_object(&self) -> bool {
        self.made
    }

    fn bind_surface(&mut self, surface: Option<SurfaceInfo>) -> Result<()> {
        if !self.made {
            return Err(disposed_renderer());
        }
        self.surface = surface;
        Ok(())
    }

    fn draw(&mut self, artboard: &Artboard, _params: &DrawParams) -> Result<()> {
        if !self.made {
            return Err(disposed_renderer());
        }
        let bounds = artboard.bounds()?;
        log::trace!(
            "headless frame {} ({}x{})",
            self.frames,
            bounds.width(),
            bounds.height()
        );
        self.frames += 1;
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        self.made = false;
        self.surface = None;
        Ok(())
    }
}
