//! Render loop for rivet controllers.
//!
//! A [`RenderLoop`] owns a [`WorkerThread`] that advances a
//! [`Controller`](rivet_playback_core::Controller) and draws its active
//! artboard into a [`SharedSurface`] through a [`RenderBackend`]. The
//! loop ticks only while something is playing and goes quiet otherwise.

pub mod backend;
pub mod config;
pub mod error;
pub mod render_loop;
pub mod stats;
pub mod surface;
pub mod worker;

pub use backend::{HeadlessBackend, NativeBackend, RenderBackend};
pub use config::{BackendKind, RenderConfig};
pub use error::{RenderError, Result};
pub use render_loop::{Lifecycle, RenderLoop};
pub use stats::FrameStats;
pub use surface::{OffscreenSurface, PlatformSurface, SharedSurface};
pub use worker::{FrameCallback, WorkerThread};
