use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod platforms;
pub mod ytdlp;

pub use platforms::{PlatformProfile, PlatformRegistry};
pub use ytdlp::YtDlpDownloader;

use crate::config::{FallbackPolicy, MediaConfig};
use crate::media::{AssetKind, MediaAsset};
use crate::{AnalyzerError, PipelineResult, Result};

/// Extensions checked, in order, after a successful download
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov"];

/// Everything the downloader needs for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// yt-dlp format selector
    pub format: String,

    /// Output path with an `%(ext)s` placeholder
    pub output_template: PathBuf,

    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub extractor_args: Vec<String>,
    pub proxy: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub retries: u32,
}

/// The external downloading capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Resolve `url` and write the video to `options.output_template`
    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<()>;
}

/// Obtains a local video file for a URL, falling back to a lower quality once
pub struct MediaFetcher {
    downloader: Arc<dyn VideoDownloader>,
    registry: PlatformRegistry,
    default_max_height: u32,
    fallback: FallbackPolicy,
    user_agent: String,
    proxy: Option<String>,
    cookies_file: Option<PathBuf>,
    retries: u32,
}

impl MediaFetcher {
    pub fn new(downloader: Arc<dyn VideoDownloader>, registry: PlatformRegistry, config: &MediaConfig) -> Self {
        Self {
            downloader,
            registry,
            default_max_height: config.max_height,
            fallback: config.fallback.clone(),
            user_agent: config.user_agent.clone(),
            proxy: config.proxy.clone(),
            cookies_file: config.cookies_file.clone(),
            retries: config.retries,
        }
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// Download `url` into `dest_dir`
    pub async fn fetch(&self, url: &str, dest_dir: &Path) -> PipelineResult<MediaAsset> {
        let profile = self.registry.lookup(url);
        let reserved = MediaAsset::reserve(AssetKind::Video, dest_dir, None);
        let stem = reserved.stem();

        tracing::info!("Downloading {} using the {} profile", url, profile.name);

        let max_height = profile.max_height.unwrap_or(self.default_max_height);
        let primary = self.options_for(profile, primary_format(max_height), &reserved.path);

        if let Err(primary_err) = self.downloader.download(url, &primary).await {
            tracing::warn!("First download attempt failed: {:#}", primary_err);
            remove_partials(dest_dir, &stem);

            let Some(fallback_format) = self.fallback.format_selector() else {
                return Err(AnalyzerError::FetchFailure(format!("{:#}", primary_err)));
            };

            tracing::info!("Retrying download with format {}", fallback_format);
            let fallback = self.options_for(profile, fallback_format, &reserved.path);

            if let Err(fallback_err) = self.downloader.download(url, &fallback).await {
                remove_partials(dest_dir, &stem);
                return Err(AnalyzerError::FetchFailure(format!("{:#}", fallback_err)));
            }
        }

        let path = locate_download(dest_dir, &stem)?;
        tracing::info!("Successfully downloaded: {}", path.display());

        Ok(MediaAsset {
            path,
            ..reserved
        })
    }

    fn options_for(&self, profile: &PlatformProfile, format: String, stem_path: &Path) -> DownloadOptions {
        if profile.needs_cookies && self.cookies_file.is_none() {
            tracing::warn!("{} usually requires cookies; set media.cookies_file if downloads fail", profile.name);
        }

        DownloadOptions {
            format,
            output_template: PathBuf::from(format!("{}.%(ext)s", stem_path.to_string_lossy())),
            user_agent: profile
                .user_agent
                .clone()
                .unwrap_or_else(|| self.user_agent.clone()),
            headers: profile.headers.clone(),
            extractor_args: profile.extractor_args.clone(),
            proxy: self.proxy.clone(),
            cookies_file: self.cookies_file.clone(),
            retries: self.retries,
        }
    }
}

/// Bounded-resolution selector for the first attempt
pub fn primary_format(max_height: u32) -> String {
    format!("best[height<={0}]/worst[height<={0}]", max_height)
}

/// The downloader names its output itself; look for the extensions we accept
fn locate_download(dir: &Path, stem: &str) -> PipelineResult<PathBuf> {
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| AnalyzerError::NotFound("Downloaded video file not found".to_string()))
}

/// Remove whatever a failed attempt left behind (`.part`, `.ytdl`, fragments)
fn remove_partials(dir: &Path, stem: &str) {
    let Ok(entries) = fs_err::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem) {
            if let Err(e) = fs_err::remove_file(entry.path()) {
                tracing::warn!("Could not delete partial download: {}", e);
            }
        }
    }
}
