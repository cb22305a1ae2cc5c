//! Plays the fixture document's "main" artboard on a headless render loop
//! and prints what the worker reports.
//!
//! Run with `RUST_LOG=debug` to see the worker and handle logs.

use std::time::Duration;

use anyhow::{Context, Result};
use rivet_engine_sim::SimEngine;
use rivet_playback_core::{ChannelListener, Controller, ControllerConfig, PlaybackEvent};
use rivet_render_core::{OffscreenSurface, RenderConfig, RenderLoop, SharedSurface};
use rivet_runtime_core::{File, NativeObject, Runtime};
use rivet_test_fixtures::documents;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = SimEngine::shared();
    let runtime = Runtime::new(engine.clone());
    let bytes = documents::bytes("playback").context("loading the playback fixture")?;
    let file = File::import(&runtime, &bytes).context("importing the playback fixture")?;

    let controller = Controller::shared(ControllerConfig {
        animation_name: Some("one".into()),
        ..ControllerConfig::default()
    });
    let (listener, events) = ChannelListener::new();
    controller.register_listener(listener);

    let render_loop = RenderLoop::new(controller.clone(), runtime, RenderConfig::headless())?;
    let surface = SharedSurface::new(OffscreenSurface::new(1, 800, 600));
    render_loop.set_surface(&surface)?;
    render_loop.start()?;
    controller.set_file(&file, None)?;

    while let Ok(event) = events.recv_timeout(Duration::from_secs(3)) {
        log::info!("{}", serde_json::to_string(&event)?);
        if matches!(event, PlaybackEvent::Stop { .. }) {
            break;
        }
    }

    let stats = render_loop.stats();
    log::info!(
        "{} frames drawn, {:.1} fps over the last frames",
        stats.frames(),
        stats.average_fps().unwrap_or_default()
    );

    render_loop.delete()?;
    surface.release()?;
    controller.release()?;
    file.release()?;
    log::info!("{} native objects left", engine.total_live());
    Ok(())
}
