//! Frame-by-frame video export
//!
//! Export drives the timestep itself: every frame is rendered offscreen,
//! read back and handed to a [`FrameSink`]. The scene's playback state and
//! camera aspect are restored afterwards, whether the export finished,
//! was cancelled or failed.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ChildStdin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::scene::{PlaybackController, Scene};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write frame: {0}")]
    Write(#[from] std::io::Error),
    #[error("encoder exited with {0}")]
    Encoder(std::process::ExitStatus),
    #[error("frame is {found} bytes, expected {expected}")]
    FrameSize { expected: usize, found: usize },
    #[error("scene is not initialized")]
    SceneNotReady,
    #[error("invalid export settings: {0}")]
    Settings(String),
}

/// Consumer of tightly packed RGBA8 frames.
pub trait FrameSink {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), ExportError>;

    /// Flush and close. Called once after the last frame.
    fn finish(&mut self) -> Result<(), ExportError>;
}

/// Shared flag checked before every exported frame.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl ExportSettings {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Frames needed to cover `duration` seconds, both ends included.
    pub fn frame_count(&self, duration: f64) -> u64 {
        (duration.max(0.0) * self.fps as f64).floor() as u64 + 1
    }

    fn validate(&self) -> Result<(), ExportError> {
        if self.width == 0 || self.height == 0 || self.fps == 0 {
            return Err(ExportError::Settings(format!(
                "{}x{} at {} fps",
                self.width, self.height, self.fps
            )));
        }
        Ok(())
    }
}

/// Pipes raw frames into an `ffmpeg` process. The container is picked by
/// ffmpeg from the output file extension.
pub struct FfmpegSink {
    child: FfmpegChild,
    stdin: Option<BufWriter<ChildStdin>>,
    output: PathBuf,
    frame_bytes: usize,
}

impl FfmpegSink {
    pub const PROGRAM: &'static str = "ffmpeg";

    pub fn spawn(output: &Path, settings: &ExportSettings) -> Result<Self, ExportError> {
        settings.validate()?;
        let mut command = FfmpegCommand::new();
        command
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{}x{}", settings.width, settings.height)])
            .args(["-r", &settings.fps.to_string()])
            .args(["-i", "pipe:0"])
            .args(["-pix_fmt", "yuv420p"])
            .arg(output);
        let mut child = command.spawn().map_err(|source| ExportError::Spawn {
            program: Self::PROGRAM.to_string(),
            source,
        })?;
        let stdin = child.take_stdin().map(BufWriter::new);
        log::info!(
            "Exporting {}x{} @ {} fps to {}",
            settings.width,
            settings.height,
            settings.fps,
            output.display()
        );
        Ok(Self {
            child,
            stdin,
            output: output.to_path_buf(),
            frame_bytes: settings.frame_bytes(),
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), ExportError> {
        if rgba.len() != self.frame_bytes {
            return Err(ExportError::FrameSize {
                expected: self.frame_bytes,
                found: rgba.len(),
            });
        }
        match self.stdin.as_mut() {
            Some(stdin) => Ok(stdin.write_all(rgba)?),
            None => Err(ExportError::Write(std::io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let status = self.child.wait()?;
        if !status.success() {
            return Err(ExportError::Encoder(status));
        }
        log::info!("Wrote {}", self.output.display());
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Closing stdin lets an unfinished encoder exit.
        self.stdin.take();
        let _ = self.child.wait();
    }
}

/// Snapshot of the interactive state an export disturbs. Restored on drop.
pub struct ExportSession<'a> {
    scene: &'a mut Scene,
    playback: PlaybackController,
    aspect: f32,
}

impl<'a> ExportSession<'a> {
    pub fn begin(scene: &'a mut Scene) -> Self {
        let playback = scene.playback().clone();
        let aspect = scene.camera().aspect();
        Self {
            scene,
            playback,
            aspect,
        }
    }

    pub fn scene(&mut self) -> &mut Scene {
        &mut *self.scene
    }
}

impl Drop for ExportSession<'_> {
    fn drop(&mut self) {
        *self.scene.playback_mut() = self.playback.clone();
        self.scene.camera_mut().set_aspect(self.aspect, 1.0);
        log::debug!("Restored playback at t={:.3}", self.playback.timestep());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub frames: u64,
    pub cancelled: bool,
}

/// Offscreen color texture the export renders into.
struct ExportTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
    format: TextureFormat,
}

impl ExportTarget {
    fn new(backend: &mut dyn GraphicsBackend, settings: &ExportSettings) -> BackendResult<Self> {
        let format = backend.swapchain_format();
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("export_color".to_string()),
            width: settings.width,
            height: settings.height,
            array_layers: 1,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        })?;
        let view = backend.create_texture_view(texture, TextureViewDimension::D2)?;
        Ok(Self { texture, view, format })
    }

    fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.texture);
    }
}

/// Swap the red and blue channels of BGRA pixels in place.
fn bgra_to_rgba(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

/// Render the scene's whole playback range into `sink`.
pub fn export(
    backend: &mut dyn GraphicsBackend,
    scene: &mut Scene,
    sink: &mut dyn FrameSink,
    settings: &ExportSettings,
    cancel: &CancellationToken,
) -> Result<ExportSummary, ExportError> {
    settings.validate()?;
    if !scene.state().is_live() {
        return Err(ExportError::SceneNotReady);
    }

    let mut session = ExportSession::begin(scene);
    let scene = session.scene();
    scene
        .camera_mut()
        .set_aspect(settings.width as f32, settings.height as f32);
    let playback = scene.playback_mut();
    playback.restart();
    let total = settings.frame_count(playback.end() - playback.begin());
    let dt = 1.0 / settings.fps as f64;

    let target = ExportTarget::new(backend, settings)?;
    let result = render_frames(backend, scene, sink, settings, &target, total, dt, cancel);
    target.destroy(backend);

    let summary = result?;
    sink.finish()?;
    if summary.cancelled {
        log::warn!("Export cancelled after {} of {} frames", summary.frames, total);
    } else {
        log::info!("Exported {} frames", summary.frames);
    }
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn render_frames(
    backend: &mut dyn GraphicsBackend,
    scene: &mut Scene,
    sink: &mut dyn FrameSink,
    settings: &ExportSettings,
    target: &ExportTarget,
    total: u64,
    dt: f64,
    cancel: &CancellationToken,
) -> Result<ExportSummary, ExportError> {
    for frame in 0..total {
        if cancel.is_cancelled() {
            return Ok(ExportSummary {
                frames: frame,
                cancelled: true,
            });
        }

        backend.begin_offscreen_frame();
        scene.update();
        scene.render(backend, target.view, settings.width, settings.height);
        let mut pixels = backend.read_texture(target.texture, settings.width, settings.height)?;
        if target.format.is_bgra() {
            bgra_to_rgba(&mut pixels);
        }
        sink.write_frame(&pixels)?;
        scene.playback_mut().advance_by(dt);

        for error in backend.poll_errors() {
            log::warn!("GPU error during export: {}", error);
        }
        log::trace!("Exported frame {}/{}", frame + 1, total);
    }

    Ok(ExportSummary {
        frames: total,
        cancelled: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_includes_both_ends() {
        let settings = ExportSettings {
            width: 4,
            height: 4,
            fps: 30,
        };
        assert_eq!(settings.frame_count(0.0), 1);
        assert_eq!(settings.frame_count(1.0), 31);
        assert_eq!(settings.frame_count(2.5), 76);
        assert_eq!(settings.frame_bytes(), 64);
    }

    #[test]
    fn test_bgra_swizzle() {
        let mut pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        bgra_to_rgba(&mut pixels);
        assert_eq!(pixels, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_zero_sized_settings_rejected() {
        let settings = ExportSettings {
            width: 0,
            height: 4,
            fps: 30,
        };
        assert!(matches!(settings.validate(), Err(ExportError::Settings(_))));
    }
}
