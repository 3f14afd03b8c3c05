use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::config::VideoConfig;

/// A decoded video source owned by one relay session
#[async_trait]
pub trait FrameSource: Send {
    /// Next decoded frame. An error means this read failed; the handle may
    /// or may not still be usable, see `is_open`.
    async fn read_frame(&mut self) -> Result<RgbImage>;

    fn is_open(&mut self) -> bool;
}

/// Opens a `FrameSource` for an RTSP URL
#[async_trait]
pub trait CaptureOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>>;
}

/// Decodes RTSP through an `ffmpeg` child process writing raw RGB24 frames,
/// already scaled to the output resolution, to its stdout.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg_bin: String,
    rtsp_transport: String,
    width: u32,
    height: u32,
    read_timeout: Duration,
}

impl FfmpegOpener {
    pub fn new(video: &VideoConfig) -> Self {
        Self {
            ffmpeg_bin: video.ffmpeg_bin.clone(),
            rtsp_transport: video.rtsp_transport.clone(),
            width: video.width,
            height: video.height,
            read_timeout: Duration::from_millis(video.read_timeout_ms),
        }
    }

    fn command(&self, url: &str) -> Command {
        let scale = format!("scale={}:{}", self.width, self.height);
        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .args(["-rtsp_transport", self.rtsp_transport.as_str()])
            .args(["-i", url])
            .arg("-an")
            .args(["-vf", scale.as_str()])
            .args(["-pix_fmt", "rgb24"])
            .args(["-f", "rawvideo"])
            .args(["-loglevel", "error"])
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CaptureOpener for FfmpegOpener {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>> {
        info!("🎥 Opening RTSP source {}", url);
        let mut child = self
            .command(url)
            .spawn()
            .with_context(|| format!("spawning {}", self.ffmpeg_bin))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout not captured"))?;

        Ok(Box::new(FfmpegSource {
            child,
            stdout,
            width: self.width,
            height: self.height,
            read_timeout: self.read_timeout,
            broken: false,
        }))
    }
}

/// Dropping the source kills the decoder process.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    read_timeout: Duration,
    broken: bool,
}

impl FfmpegSource {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn read_frame(&mut self) -> Result<RgbImage> {
        let mut buffer = vec![0u8; self.frame_len()];

        let read = tokio::time::timeout(self.read_timeout, self.stdout.read_exact(&mut buffer)).await;
        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                // EOF or a broken pipe: the decoder is gone
                self.broken = true;
                return Err(anyhow!("ffmpeg stream ended: {}", e));
            }
            Err(_) => {
                // A partial frame may have been consumed; resync by reopening
                self.broken = true;
                return Err(anyhow!("no frame within {:?}", self.read_timeout));
            }
        }

        RgbImage::from_raw(self.width, self.height, buffer)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }

    fn is_open(&mut self) -> bool {
        if self.broken {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("ffmpeg exited with {}", status);
                false
            }
            Err(_) => false,
        }
    }
}
