use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{DownloadOptions, VideoDownloader};
use crate::Result;

/// Video downloader backed by yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Command line for one download attempt
    pub fn build_args(url: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--format".to_string(),
            options.format.clone(),
            "--output".to_string(),
            options.output_template.to_string_lossy().into_owned(),
            "--user-agent".to_string(),
            options.user_agent.clone(),
            "--retries".to_string(),
            options.retries.to_string(),
            "--fragment-retries".to_string(),
            options.retries.to_string(),
            "--skip-unavailable-fragments".to_string(),
        ];

        for (name, value) in &options.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        for extractor_arg in &options.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_arg.clone());
        }

        if let Some(proxy) = &options.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        if let Some(cookies) = &options.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }

        // end of options, so a URL starting with '-' is not parsed as a flag
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<()> {
        tracing::debug!("Downloading {} with format {}", url, options.format);

        let output = Command::new(&self.yt_dlp_path)
            .args(Self::build_args(url, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start {}: {}", self.yt_dlp_path, e))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        Ok(())
    }
}
