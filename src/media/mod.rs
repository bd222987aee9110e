use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

pub mod audio;
pub mod ffmpeg;
pub mod frames;

pub use audio::AudioExtractor;
pub use ffmpeg::{FfmpegTranscoder, Transcoder};
pub use frames::{FrameSampler, FrameSet};

/// What a temporary file on disk holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Video,
    Audio,
    Frame,
    FrameDir,
}

impl AssetKind {
    /// File name prefix used for generated names
    pub fn prefix(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Frame => "frame",
            AssetKind::FrameDir => "frames",
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, AssetKind::FrameDir)
    }
}

/// Handle to a temporary file created while serving one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub path: PathBuf,
}

impl MediaAsset {
    /// Wrap an existing path with a fresh identifier
    pub fn new(kind: AssetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            path: path.into(),
        }
    }

    /// Allocate a collision-free path `<dir>/<prefix>_<id>[.<ext>]`
    pub fn reserve(kind: AssetKind, dir: &Path, extension: Option<&str>) -> Self {
        let id = Uuid::new_v4();
        let stem = format!("{}_{}", kind.prefix(), id.simple());
        let name = match extension {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        };
        Self {
            id,
            kind,
            path: dir.join(name),
        }
    }

    /// File name without extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of releasing a workspace
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

/// Per-request scratch directory plus the ledger of assets created in it.
///
/// Every registered asset is deleted exactly once, either by [`Workspace::release`]
/// or, if the workspace is dropped unreleased, by `Drop`. The directory itself
/// goes with it, taking any unregistered leftovers (e.g. partial downloads).
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    assets: Vec<MediaAsset>,
    seen: HashSet<PathBuf>,
}

impl Workspace {
    /// Create a fresh `analysis_*` directory under `temp_root`
    pub fn create(temp_root: &Path) -> std::io::Result<Self> {
        fs_err::create_dir_all(temp_root)?;
        let dir = tempfile::Builder::new()
            .prefix("analysis_")
            .tempdir_in(temp_root)?;
        let root = dir.path().to_path_buf();

        tracing::debug!("Created workspace: {}", root.display());

        Ok(Self {
            dir: Some(dir),
            root,
            assets: Vec::new(),
            seen: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Record an asset for cleanup; returns false if its path was already known
    pub fn register(&mut self, asset: MediaAsset) -> bool {
        if !self.seen.insert(asset.path.clone()) {
            return false;
        }
        self.assets.push(asset);
        true
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    /// Delete every registered asset, then the workspace directory
    pub fn release(mut self) -> CleanupReport {
        let report = remove_assets(std::mem::take(&mut self.assets));
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!("Could not remove workspace {}: {}", self.root.display(), e);
            }
        }
        report
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            let report = remove_assets(std::mem::take(&mut self.assets));
            tracing::debug!(
                removed = report.removed,
                "Workspace {} dropped without release",
                self.root.display()
            );
        }
    }
}

/// Files first, then directories, so directories are empty when removed
fn remove_assets(assets: Vec<MediaAsset>) -> CleanupReport {
    let mut report = CleanupReport::default();
    let (dirs, files): (Vec<_>, Vec<_>) = assets.into_iter().partition(|a| a.kind.is_dir());

    for asset in files.iter().chain(dirs.iter()) {
        if !asset.path.exists() {
            continue;
        }
        let result = if asset.kind.is_dir() {
            fs_err::remove_dir_all(&asset.path)
        } else {
            fs_err::remove_file(&asset.path)
        };
        match result {
            Ok(()) => {
                report.removed += 1;
                tracing::debug!("Cleaned up: {}", asset.path.display());
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!("Could not delete {}: {}", asset.path.display(), e);
            }
        }
    }

    report
}

/// Ensure an input file exists before handing it to an external tool
pub(crate) fn require_file(path: &Path) -> crate::PipelineResult<()> {
    if !path.is_file() {
        return Err(crate::AnalyzerError::NotFound(format!(
            "Video file does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_generates_unique_names() {
        let dir = Path::new("/tmp/work");
        let a = MediaAsset::reserve(AssetKind::Audio, dir, Some("wav"));
        let b = MediaAsset::reserve(AssetKind::Audio, dir, Some("wav"));

        assert_ne!(a.path, b.path);
        assert!(a.stem().starts_with("audio_"));
        assert_eq!(a.path.extension().unwrap(), "wav");
        assert!(a.stem().contains(&a.id.simple().to_string()));
    }

    #[test]
    fn test_register_is_idempotent_per_path() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::create(root.path()).unwrap();
        let path = workspace.path().join("video.mp4");

        assert!(workspace.register(MediaAsset::new(AssetKind::Video, &path)));
        assert!(!workspace.register(MediaAsset::new(AssetKind::Video, &path)));
        assert_eq!(workspace.assets().len(), 1);
    }

    #[test]
    fn test_release_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::create(root.path()).unwrap();

        let video = workspace.path().join("video_1.mp4");
        fs_err::write(&video, b"video").unwrap();
        let frames = workspace.path().join("frames_1");
        fs_err::create_dir(&frames).unwrap();
        let frame = frames.join("frame_001.jpg");
        fs_err::write(&frame, b"jpeg").unwrap();
        // not registered, still removed with the workspace
        fs_err::write(workspace.path().join("video_1.mp4.part"), b"partial").unwrap();

        workspace.register(MediaAsset::new(AssetKind::FrameDir, &frames));
        workspace.register(MediaAsset::new(AssetKind::Frame, &frame));
        workspace.register(MediaAsset::new(AssetKind::Video, &video));
        let workspace_path = workspace.path().to_path_buf();

        let report = workspace.release();

        assert_eq!(report, CleanupReport { removed: 3, failed: 0 });
        assert!(!workspace_path.exists());
        assert_eq!(fs_err::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_cleans_up_unreleased_workspace() {
        let root = tempfile::tempdir().unwrap();
        let workspace_path = {
            let mut workspace = Workspace::create(root.path()).unwrap();
            let audio = workspace.path().join("audio_1.wav");
            fs_err::write(&audio, b"RIFF").unwrap();
            workspace.register(MediaAsset::new(AssetKind::Audio, audio));
            workspace.path().to_path_buf()
        };

        assert!(!workspace_path.exists());
    }

    #[test]
    fn test_require_file() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope.mp4");
        let err = require_file(&missing).unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(err.to_string().contains("does not exist"));
    }
}
