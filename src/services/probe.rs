//! src/services/probe.rs
//!
//! MediaProbe: best-effort extraction of thumbnails and durations from
//! uploaded payloads. The ffmpeg adapter shells out to `ffprobe` and
//! `ffmpeg` with a hard time budget per call; anything that fails or
//! times out simply yields an empty field and the upload proceeds
//! without it.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{fs, process::Command, time::timeout};
use tracing::debug;
use uuid::Uuid;

use crate::models::entry::MediaKind;

/// Hard budget for each probe subprocess.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
/// Target thumbnail width; height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 480;
/// Seek offset for video thumbnails, skipping black lead-in frames.
const VIDEO_FRAME_OFFSET_SECS: &str = "1";

/// Fixed artwork used for audio entries.
const AUDIO_ICON_SVG: &str = r##"<svg width="64" height="64" viewBox="0 0 64 64" xmlns="http://www.w3.org/2000/svg">
  <path d="M40 18v22.5a6 6 0 1 1-4-5.2V22l-10 2v16.5a6 6 0 1 1-4-5.2V20l18-4z"
        fill="#2563eb"/>
</svg>"##;

/// Thumbnail material produced by a probe. Rendered frames are stored as
/// blobs; the audio icon is inlined as a data URL.
#[derive(Debug, Clone)]
pub enum Thumbnail {
    Jpeg(Vec<u8>),
    DataUrl(String),
}

/// What a probe managed to extract. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub thumbnail: Option<Thumbnail>,
    pub duration_seconds: Option<f64>,
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Extract thumbnail and duration from a payload. Never fails; missing
    /// fields mean the probe gave up within its budget.
    async fn probe(&self, kind: MediaKind, filename: &str, data: &Bytes) -> ProbeOutcome;
}

/// The data URL all audio entries use as artwork.
pub fn audio_icon_data_url() -> String {
    format!(
        "data:image/svg+xml;base64,{}",
        BASE64.encode(AUDIO_ICON_SVG)
    )
}

/// [`MediaProbe`] backed by the ffmpeg toolchain.
pub struct FfmpegProbe {
    spool_dir: PathBuf,
    timeout: Duration,
}

impl FfmpegProbe {
    pub fn new(spool_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            timeout,
        }
    }

    /// Spool the payload to disk so ffmpeg can seek in it.
    async fn spool(&self, filename: &str, data: &Bytes) -> Option<PathBuf> {
        if let Err(err) = fs::create_dir_all(&self.spool_dir).await {
            debug!("failed to create probe spool dir: {}", err);
            return None;
        }
        let path = self
            .spool_dir
            .join(format!("probe-{}{}", Uuid::new_v4(), extension_of(filename)));
        match fs::write(&path, data).await {
            Ok(_) => Some(path),
            Err(err) => {
                debug!("failed to spool payload for probing: {}", err);
                None
            }
        }
    }

    async fn ffprobe_duration(&self, src: &PathBuf) -> Option<f64> {
        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(src)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output()).await.ok()?.ok()?;
        if !output.status.success() {
            return None;
        }
        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Render a single frame as JPEG, scaled to [`THUMBNAIL_WIDTH`].
    async fn extract_frame(&self, src: &PathBuf, offset: Option<&str>) -> Option<Vec<u8>> {
        let out = self.spool_dir.join(format!("thumb-{}.jpg", Uuid::new_v4()));
        let mut cmd = Command::new("ffmpeg");
        if let Some(offset) = offset {
            cmd.args(["-ss", offset]);
        }
        cmd.arg("-i")
            .arg(src)
            .args(["-frames:v", "1", "-vf"])
            .arg(format!("scale={}:-2", THUMBNAIL_WIDTH))
            .arg("-y")
            .arg(&out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = timeout(self.timeout, cmd.status()).await.ok()?.ok()?;
        if !status.success() {
            let _ = fs::remove_file(&out).await;
            return None;
        }
        let bytes = fs::read(&out).await.ok();
        let _ = fs::remove_file(&out).await;
        bytes.filter(|b| !b.is_empty())
    }
}

#[async_trait]
impl MediaProbe for FfmpegProbe {
    async fn probe(&self, kind: MediaKind, filename: &str, data: &Bytes) -> ProbeOutcome {
        let Some(src) = self.spool(filename, data).await else {
            return ProbeOutcome::default();
        };

        let outcome = match kind {
            MediaKind::Video => ProbeOutcome {
                duration_seconds: self.ffprobe_duration(&src).await,
                thumbnail: self
                    .extract_frame(&src, Some(VIDEO_FRAME_OFFSET_SECS))
                    .await
                    .map(Thumbnail::Jpeg),
            },
            MediaKind::Image => ProbeOutcome {
                duration_seconds: None,
                thumbnail: self.extract_frame(&src, None).await.map(Thumbnail::Jpeg),
            },
            MediaKind::Audio => ProbeOutcome {
                duration_seconds: self.ffprobe_duration(&src).await,
                thumbnail: Some(Thumbnail::DataUrl(audio_icon_data_url())),
            },
        };

        let _ = fs::remove_file(&src).await;
        outcome
    }
}

fn parse_duration_output(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{}", ext),
        _ => String::new(),
    }
}
