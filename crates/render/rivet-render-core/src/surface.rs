use std::sync::Arc;

use parking_lot::Mutex;

use rivet_runtime_core::{HandleKind, RefCount, RuntimeError, SurfaceInfo};

/// A platform drawing target, e.g. a window or an offscreen texture.
pub trait PlatformSurface: Send + Sync {
    fn info(&self) -> SurfaceInfo;

    /// Gives the target back to the platform. Called exactly once.
    fn release(&self);
}

/// A surface with no platform resources behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffscreenSurface {
    info: SurfaceInfo,
}

impl OffscreenSurface {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            info: SurfaceInfo { id, width, height },
        }
    }
}

impl PlatformSurface for OffscreenSurface {
    fn info(&self) -> SurfaceInfo {
        self.info
    }

    fn release(&self) {
        log::trace!("offscreen surface {} released", self.info.id);
    }
}

struct SurfaceInner {
    platform: Box<dyn PlatformSurface>,
    refs: Mutex<RefCount>,
}

impl Drop for SurfaceInner {
    fn drop(&mut self) {
        if !self.refs.get_mut().is_disposed() {
            log::warn!(
                "surface {} dropped with {} outstanding reference(s); releasing",
                self.platform.info().id,
                self.refs.get_mut().count()
            );
            self.platform.release();
        }
    }
}

/// Reference-counted wrapper over a [`PlatformSurface`].
///
/// The creator holds the first reference. The render loop takes its own
/// while it draws into the surface, so the platform release happens only
/// once both sides have let go.
#[derive(Clone)]
pub struct SharedSurface {
    inner: Arc<SurfaceInner>,
}

impl SharedSurface {
    pub fn new(platform: impl PlatformSurface + 'static) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                platform: Box::new(platform),
                refs: Mutex::new(RefCount::new(HandleKind::Surface)),
            }),
        }
    }

    pub fn acquire(&self) -> Result<usize, RuntimeError> {
        self.inner.refs.lock().acquire()
    }

    pub fn release(&self) -> Result<usize, RuntimeError> {
        let mut refs = self.inner.refs.lock();
        let count = refs.release()?;
        if count == 0 {
            self.inner.platform.release();
        }
        Ok(count)
    }

    pub fn info(&self) -> Result<SurfaceInfo, RuntimeError> {
        let refs = self.inner.refs.lock();
        if refs.is_disposed() {
            return Err(RuntimeError::UseAfterDispose {
                kind: HandleKind::Surface,
            });
        }
        Ok(self.inner.platform.info())
    }

    pub fn ref_count(&self) -> usize {
        self.inner.refs.lock().count()
    }

    pub fn has_object(&self) -> bool {
        !self.inner.refs.lock().is_disposed()
    }

    pub fn ptr_eq(&self, other: &SharedSurface) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SharedSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let refs = self.inner.refs.lock();
        f.debug_struct("SharedSurface")
            .field("refs", &refs.count())
            .field("disposed", &refs.is_disposed())
            .finish()
    }
}
