//! The render loop: a controller, a backend and a surface driven by a
//! [`WorkerThread`].
//!
//! Lock order on the worker is frame state, then the controller's active
//! artboard graph, then the renderer's graph. Control threads never take
//! the frame lock while holding a controller lock.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use rivet_playback_core::Controller;
use rivet_runtime_core::Runtime;

use crate::backend::RenderBackend;
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::stats::FrameStats;
use crate::surface::SharedSurface;
use crate::worker::WorkerThread;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Created,
    Attached,
    Started,
    Stopped,
    Detached,
    Deleted,
}

struct FrameState {
    backend: Box<dyn RenderBackend>,
    surface: Option<SharedSurface>,
    stats: FrameStats,
}

struct LoopInner {
    controller: Arc<Controller>,
    runtime: Runtime,
    config: RenderConfig,
    frame: Mutex<FrameState>,
    lifecycle: Mutex<Lifecycle>,
    error: Mutex<Option<RenderError>>,
    worker: WorkerThread,
}

impl LoopInner {
    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    fn make_backend(&self) -> rivet_runtime_core::Result<()> {
        self.frame.lock().backend.make(&self.runtime)
    }

    fn on_start(&self) {
        if self.lifecycle() == Lifecycle::Started {
            self.worker.set_ticking(true);
        }
    }

    fn frame(&self, elapsed: f32) {
        if self.lifecycle() != Lifecycle::Started {
            return;
        }
        if self.config.trace {
            log::debug!("frame: +{elapsed:.4}s");
        }
        let result = self
            .controller
            .advance(elapsed)
            .map_err(RenderError::from)
            .and_then(|()| self.draw());
        match result {
            Ok(()) => {
                self.controller.if_idle(|| {
                    log::trace!("controller idle; render loop waits for a play request");
                    self.worker.set_ticking(false);
                });
            }
            Err(err) => {
                log::error!("render frame failed: {err}");
                *self.error.lock() = Some(err);
                if self.config.halt_on_error {
                    self.worker.set_ticking(false);
                }
            }
        }
    }

    fn draw(&self) -> Result<()> {
        let mut frame = self.frame.lock();
        let FrameState {
            backend,
            surface,
            stats,
        } = &mut *frame;
        if surface.is_none() || !backend.has_object() {
            return Ok(());
        }
        let params = self.controller.draw_params();
        match self
            .controller
            .with_active_artboard(|artboard| backend.draw(artboard, &params))
        {
            Some(drawn) => {
                drawn?;
                stats.record(Instant::now());
            }
            None => log::trace!("no live artboard to draw"),
        }
        Ok(())
    }

    fn attach(&self, surface: SharedSurface) -> rivet_runtime_core::Result<()> {
        let mut frame = self.frame.lock();
        if frame
            .surface
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&surface))
        {
            surface.release()?;
            return Ok(());
        }
        let bound = surface
            .info()
            .and_then(|info| frame.backend.bind_surface(Some(info)));
        if let Err(err) = bound {
            surface.release()?;
            return Err(err);
        }
        match frame.surface.replace(surface) {
            Some(previous) => previous.release().map(|_| ()),
            None => Ok(()),
        }
    }

    fn detach(&self) -> rivet_runtime_core::Result<()> {
        let mut frame = self.frame.lock();
        let Some(surface) = frame.surface.take() else {
            return Ok(());
        };
        let unbound = if frame.backend.has_object() {
            frame.backend.bind_surface(None)
        } else {
            Ok(())
        };
        let released = surface.release();
        unbound?;
        released.map(|_| ())
    }

    fn release_frame_resources(&self) -> rivet_runtime_core::Result<()> {
        let mut frame = self.frame.lock();
        let deleted = frame.backend.delete();
        let released = frame.surface.take().map(|surface| surface.release());
        deleted?;
        if let Some(released) = released {
            released?;
        }
        Ok(())
    }
}

/// Drives a [`Controller`] on a dedicated worker: advance, then draw, once
/// per frame interval while anything is playing.
///
/// Dropping the loop deletes it.
pub struct RenderLoop {
    inner: Arc<LoopInner>,
}

impl RenderLoop {
    pub fn new(controller: Arc<Controller>, runtime: Runtime, config: RenderConfig) -> Result<Self> {
        let backend = config.backend.build();
        Self::with_backend(controller, runtime, config, backend)
    }

    /// Builds the loop around a caller-supplied backend. The backend is
    /// made on the worker before this returns.
    pub fn with_backend(
        controller: Arc<Controller>,
        runtime: Runtime,
        config: RenderConfig,
        backend: Box<dyn RenderBackend>,
    ) -> Result<Self> {
        let worker = WorkerThread::spawn(&config.worker_name, config.frame_interval())?;
        controller.acquire()?;
        let render_loop = RenderLoop {
            inner: Arc::new(LoopInner {
                controller,
                runtime,
                config,
                frame: Mutex::new(FrameState {
                    backend,
                    surface: None,
                    stats: FrameStats::new(),
                }),
                lifecycle: Mutex::new(Lifecycle::Created),
                error: Mutex::new(None),
                worker,
            }),
        };

        let weak: Weak<LoopInner> = Arc::downgrade(&render_loop.inner);
        render_loop
            .inner
            .worker
            .set_frame_callback(Some(Box::new(move |elapsed| {
                if let Some(inner) = weak.upgrade() {
                    inner.frame(elapsed);
                }
            })))?;

        let maker = Arc::clone(&render_loop.inner);
        render_loop
            .inner
            .worker
            .run_and_wait(move || maker.make_backend())??;

        let weak = Arc::downgrade(&render_loop.inner);
        render_loop
            .inner
            .controller
            .set_on_start(Some(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_start();
                }
            })));
        Ok(render_loop)
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.inner.controller
    }

    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle()
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.worker.is_ticking()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.lifecycle() == Lifecycle::Deleted {
            return Err(RenderError::WorkerTerminated);
        }
        Ok(())
    }

    /// Hands `surface` to the worker, taking a reference for as long as the
    /// loop draws into it. A previous surface is released.
    pub fn set_surface(&self, surface: &SharedSurface) -> Result<()> {
        self.ensure_alive()?;
        surface.acquire()?;
        let inner = Arc::clone(&self.inner);
        let incoming = surface.clone();
        match self.inner.worker.run_and_wait(move || inner.attach(incoming)) {
            Ok(attached) => attached?,
            Err(err) => {
                surface.release()?;
                return Err(err);
            }
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Created | Lifecycle::Detached) {
            *lifecycle = Lifecycle::Attached;
        }
        Ok(())
    }

    /// Stops the loop and gives the surface back.
    pub fn clear_surface(&self) -> Result<()> {
        self.ensure_alive()?;
        self.stop();
        let inner = Arc::clone(&self.inner);
        self.inner.worker.run_and_wait(move || inner.detach())??;
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle != Lifecycle::Deleted {
            *lifecycle = Lifecycle::Detached;
        }
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Deleted => return Err(RenderError::WorkerTerminated),
                Lifecycle::Started => return Ok(()),
                Lifecycle::Created | Lifecycle::Detached => {
                    log::debug!("render loop started without a surface; frames advance only");
                }
                Lifecycle::Attached | Lifecycle::Stopped => {}
            }
            *lifecycle = Lifecycle::Started;
        }
        self.inner.controller.set_active(true);
        self.inner.worker.set_ticking(true);
        Ok(())
    }

    pub fn stop(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if *lifecycle != Lifecycle::Started {
                return;
            }
            *lifecycle = Lifecycle::Stopped;
        }
        self.inner.worker.set_ticking(false);
    }

    /// Blocks until frames and jobs already queued on the worker are done.
    pub fn wait_until_complete(&self) -> Result<()> {
        self.inner.worker.wait_until_complete()
    }

    /// Stops the worker, releases the backend and the surface on it, joins
    /// it and lets go of the controller. Blocks while a frame is in flight.
    /// Terminal; later calls are no-ops.
    pub fn delete(&self) -> Result<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if *lifecycle == Lifecycle::Deleted {
                return Ok(());
            }
            *lifecycle = Lifecycle::Deleted;
        }
        self.inner.controller.set_on_start(None);
        self.inner.worker.set_ticking(false);

        let inner = Arc::clone(&self.inner);
        let released = match self
            .inner
            .worker
            .run_and_wait(move || inner.release_frame_resources())
        {
            Ok(released) => released.map_err(RenderError::from),
            Err(err) => {
                log::warn!("render worker unavailable during delete ({err}); releasing inline");
                self.inner
                    .release_frame_resources()
                    .map_err(RenderError::from)
            }
        };
        let joined = self.inner.worker.terminate();
        let controller = self.inner.controller.release().map_err(RenderError::from);
        log::debug!("render loop '{}' deleted", self.inner.worker.name());
        released.and(joined).and(controller.map(|_| ()))
    }

    /// The last frame error, if any. Taking it clears it.
    pub fn take_error(&self) -> Option<RenderError> {
        self.inner.error.lock().take()
    }

    pub fn stats(&self) -> FrameStats {
        self.inner.frame.lock().stats.clone()
    }

    pub fn average_fps(&self) -> Option<f32> {
        self.inner.frame.lock().stats.average_fps()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Err(err) = self.delete() {
            log::warn!("render loop teardown failed: {err}");
        }
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("lifecycle", &self.lifecycle())
            .field("worker", &self.inner.worker)
            .finish()
    }
}
