use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::Result;

/// The external transcoding capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run the transcoder with the given arguments; non-zero exit is an error carrying stderr
    async fn run(&self, args: &[String]) -> Result<()>;
}

/// `ffmpeg` invoked as a child process
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, args: &[String]) -> Result<()> {
        tracing::debug!("Running {} {}", self.ffmpeg_path, args.join(" "));

        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start {}: {}", self.ffmpeg_path, e))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", self.ffmpeg_path, output.status, error.trim());
        }

        Ok(())
    }
}
