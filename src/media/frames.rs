use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{require_file, AssetKind, MediaAsset, Transcoder};
use crate::{AnalyzerError, PipelineResult};

/// Frames sampled from one video, in capture order
#[derive(Debug, Clone)]
pub struct FrameSet {
    /// Directory holding the images
    pub dir: MediaAsset,

    /// Frame images, oldest first
    pub frames: Vec<MediaAsset>,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }
}

/// Samples still images from a video at a fixed cadence
pub struct FrameSampler {
    transcoder: Arc<dyn Transcoder>,
    frame_size: u32,
    max_frames: usize,
}

impl FrameSampler {
    pub fn new(transcoder: Arc<dyn Transcoder>, frame_size: u32, max_frames: usize) -> Self {
        Self {
            transcoder,
            frame_size,
            max_frames,
        }
    }

    /// Extract one JPEG every `interval` seconds into a fresh directory under `dest_dir`
    pub async fn sample(&self, video_path: &Path, interval: f64, dest_dir: &Path) -> PipelineResult<FrameSet> {
        require_file(video_path)?;

        check_interval(interval)?;

        let dir = MediaAsset::reserve(AssetKind::FrameDir, dest_dir, None);
        fs_err::create_dir_all(&dir.path)?;

        match self.extract_into(video_path, interval, &dir.path).await {
            Ok(frames) => {
                tracing::info!("Extracted {} frames", frames.len());
                Ok(FrameSet { dir, frames })
            }
            Err(e) => {
                if let Err(cleanup) = fs_err::remove_dir_all(&dir.path) {
                    tracing::warn!("Could not remove {}: {}", dir.path.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn extract_into(&self, video_path: &Path, interval: f64, frames_dir: &Path) -> PipelineResult<Vec<MediaAsset>> {
        let args = self.build_args(video_path, interval, frames_dir);

        self.transcoder
            .run(&args)
            .await
            .map_err(|e| AnalyzerError::ExtractionFailure(format!("Failed to extract frames: {:#}", e)))?;

        let mut frames = collect_frames(frames_dir)?;

        if frames.is_empty() {
            return Err(AnalyzerError::ExtractionFailure(
                "No frames were extracted".to_string(),
            ));
        }

        if frames.len() > self.max_frames {
            tracing::debug!(
                "Keeping first {} of {} frames",
                self.max_frames,
                frames.len()
            );
            frames.truncate(self.max_frames);
        }

        Ok(frames
            .into_iter()
            .map(|(_, path)| MediaAsset::new(AssetKind::Frame, path))
            .collect())
    }

    fn build_args(&self, video_path: &Path, interval: f64, frames_dir: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            video_path.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("fps=1/{}", interval),
            "-q:v".to_string(),
            "2".to_string(),
            "-s".to_string(),
            format!("{0}x{0}", self.frame_size),
            "-frames:v".to_string(),
            self.max_frames.to_string(),
            "-y".to_string(),
            frames_dir.join("frame_%03d.jpg").to_string_lossy().into_owned(),
        ]
    }
}

/// Sampling interval must be a positive, finite number of seconds
pub(crate) fn check_interval(interval: f64) -> PipelineResult<()> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(AnalyzerError::ExtractionFailure(format!(
            "Frame interval must be positive, got {}",
            interval
        )));
    }
    Ok(())
}

/// `frame_<n>.jpg` files in `dir`, ordered by `n`
fn collect_frames(dir: &Path) -> PipelineResult<Vec<(u32, PathBuf)>> {
    let mut frames = Vec::new();

    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if let Some(index) = frame_index(&path) {
            frames.push((index, path));
        }
    }

    frames.sort_by_key(|(index, _)| *index);
    Ok(frames)
}

fn frame_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("frame_")?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}
