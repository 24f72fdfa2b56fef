//! Windowed viewer and export driver using winit

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    platform::pump_events::EventLoopExtPumpEvents,
    window::{Window, WindowBuilder},
};

use crate::backend::traits::*;
use crate::backend::WgpuBackend;
use crate::config::REFRESH_RATE_RANGE;
use crate::export::{self, CancellationToken, ExportError, ExportSettings, ExportSummary, FfmpegSink, FrameSink};
use crate::input::{InputState, Key};
use crate::scene::{CameraController, FollowController, Scene};

/// Seconds skipped by the Left/Right arrow keys.
const SEEK_STEP: f64 = 1.0;
/// Rate change per Plus/Minus press.
const RATE_STEP: f64 = 0.1;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Window and presentation settings
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Vehicle Replay".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

/// Timer period for a refresh rate, clamped to the accepted range.
fn tick_interval(refresh_rate: f64) -> Duration {
    let rate = if refresh_rate.is_finite() {
        refresh_rate.clamp(*REFRESH_RATE_RANGE.start(), *REFRESH_RATE_RANGE.end())
    } else {
        *REFRESH_RATE_RANGE.start()
    };
    Duration::from_secs_f64(1.0 / rate)
}

struct Viewer {
    window: Arc<Window>,
    backend: WgpuBackend,
    scene: Scene,
    input: InputState,
    controller: FollowController,
    last_frame: Instant,
    next_tick: Instant,
}

impl Viewer {
    fn tick_interval(&self) -> Duration {
        tick_interval(self.scene.playback().refresh_rate())
    }

    fn handle_shortcuts(&mut self) {
        let input = &self.input;
        let playback = self.scene.playback_mut();
        if input.was_triggered(Key::Space) {
            playback.play_pause();
        }
        if input.was_triggered(Key::R) || input.was_triggered(Key::Home) {
            playback.restart();
        }
        if input.was_triggered(Key::End) {
            playback.go_to_end();
        }
        if input.was_triggered(Key::Plus) {
            playback.step_rate(RATE_STEP);
        }
        if input.was_triggered(Key::Minus) {
            playback.step_rate(-RATE_STEP);
        }
        if input.was_triggered(Key::Left) {
            let t = playback.timestep() - SEEK_STEP;
            playback.seek(t);
        }
        if input.was_triggered(Key::Right) {
            let t = playback.timestep() + SEEK_STEP;
            playback.seek(t);
        }
        if input.was_triggered(Key::L) {
            playback.toggle_loop();
            log::info!("Looping {}", if playback.loop_enabled() { "on" } else { "off" });
        }
        if input.was_triggered(Key::G) {
            self.scene.toggle_gizmo();
        }
        if input.was_triggered(Key::F) {
            self.scene.toggle_forces();
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.backend.resize(size.width, size.height);
        self.scene.camera_mut().set_aspect(size.width as f32, size.height as f32);
        log::debug!("Resized to {}x{}", size.width, size.height);
    }

    /// One timer tick: input, render, advance. Returns `false` to quit.
    fn tick(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.input.was_triggered(Key::Escape) {
            return false;
        }
        self.handle_shortcuts();
        self.controller.update(self.scene.camera_mut(), &self.input, dt);

        match self.backend.begin_frame() {
            Ok(frame) => {
                self.scene.frame(&mut self.backend, frame.swapchain_view, frame.width, frame.height);
                if let Err(e) = self.backend.end_frame() {
                    log::warn!("Present failed: {}", e);
                }
            }
            Err(BackendError::SurfaceLost) => {
                log::debug!("Surface lost; reconfiguring");
                self.resize(self.window.inner_size());
            }
            Err(e) => log::warn!("Frame skipped: {}", e),
        }

        self.input.end_frame();
        true
    }
}

fn create_window(
    event_loop: &EventLoop<()>,
    config: &ViewerConfig,
    visible: bool,
) -> Result<Arc<Window>, AppError> {
    let window = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_visible(visible)
        .build(event_loop)?;
    Ok(Arc::new(window))
}

/// Open a window and replay `scene` until the window closes or Esc is pressed.
pub fn run(config: &ViewerConfig, mut scene: Scene) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let window = create_window(&event_loop, config, true)?;
    let mut backend = WgpuBackend::new(window.clone(), config.vsync)?;
    scene.initialize(&mut backend)?;

    let size = window.inner_size();
    scene.camera_mut().set_aspect(size.width as f32, size.height as f32);

    let now = Instant::now();
    let mut viewer = Viewer {
        window,
        backend,
        scene,
        input: InputState::new(),
        controller: FollowController::new(),
        last_frame: now,
        next_tick: now,
    };
    log::info!("Controller: {}", viewer.controller.name());

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| match event {
        Event::WindowEvent { event, .. } => {
            if viewer.input.handle_window_event(&event) {
                return;
            }
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => viewer.resize(size),
                WindowEvent::RedrawRequested => {
                    if !viewer.tick() {
                        elwt.exit();
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if now >= viewer.next_tick {
                viewer.window.request_redraw();
                viewer.next_tick = now + viewer.tick_interval();
            }
            elwt.set_control_flow(ControlFlow::WaitUntil(viewer.next_tick));
        }
        Event::LoopExiting => viewer.scene.cleanup(&mut viewer.backend),
        _ => {}
    })?;
    Ok(())
}

/// Forwards frames to an inner sink and drains window events between
/// frames, so closing the window or pressing Esc cancels the export.
struct PumpingSink<'a, S: FrameSink> {
    inner: S,
    event_loop: &'a mut EventLoop<()>,
    cancel: CancellationToken,
}

impl<S: FrameSink> FrameSink for PumpingSink<'_, S> {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), ExportError> {
        self.inner.write_frame(rgba)?;
        let cancel = &self.cancel;
        let _ = self.event_loop.pump_events(Some(Duration::ZERO), |event, _| {
            let Event::WindowEvent { event, .. } = event else {
                return;
            };
            let escape = matches!(
                &event,
                WindowEvent::KeyboardInput { event, .. }
                    if event.physical_key == winit::keyboard::PhysicalKey::Code(winit::keyboard::KeyCode::Escape)
            );
            if escape || matches!(event, WindowEvent::CloseRequested) {
                cancel.cancel();
            }
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.inner.finish()
    }
}

/// Render the whole trajectory of `scene` into a video file at `output`.
pub fn run_export(
    config: &ViewerConfig,
    mut scene: Scene,
    output: &Path,
    settings: &ExportSettings,
) -> Result<ExportSummary, AppError> {
    let mut event_loop = EventLoop::new()?;
    let window_config = ViewerConfig {
        title: format!("{} (exporting {})", config.title, output.display()),
        width: settings.width,
        height: settings.height,
        vsync: false,
    };
    let window = create_window(&event_loop, &window_config, true)?;
    let mut backend = WgpuBackend::new(window, false)?;
    scene.initialize(&mut backend)?;

    let cancel = CancellationToken::new();
    let result = FfmpegSink::spawn(output, settings).and_then(|sink| {
        let mut sink = PumpingSink {
            inner: sink,
            event_loop: &mut event_loop,
            cancel: cancel.clone(),
        };
        export::export(&mut backend, &mut scene, &mut sink, settings, &cancel)
    });

    scene.cleanup(&mut backend);
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_stays_bounded() {
        assert!((tick_interval(50.0).as_secs_f64() - 0.02).abs() < 1e-6);
        assert_eq!(tick_interval(1e-300), Duration::from_secs(1));
        assert_eq!(tick_interval(f64::NAN), Duration::from_secs(1));
        assert!((tick_interval(1e9).as_secs_f64() - 0.001).abs() < 1e-6);
    }
}
