use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::extractors::{MediaFetcher, PlatformRegistry, VideoDownloader, YtDlpDownloader};
use crate::insight::{InferenceBackend, InsightEngine, OpenAiClient};
use crate::media::frames::check_interval;
use crate::media::{AudioExtractor, FfmpegTranscoder, FrameSampler, Transcoder, Workspace};
use crate::utils::{format_duration, format_file_size};
use crate::{AnalyzerError, PipelineResult, Result};

/// Outcome of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// URL that was analyzed
    pub video_url: String,

    /// Speech-to-text output
    pub transcript: String,

    /// Vision model's description of the sampled frames
    pub visual_analysis: String,

    /// Combined write-up
    pub final_analysis: String,

    /// Frames sampled from the video
    pub frames_extracted: usize,

    /// Frames sent to the vision model
    pub frames_analyzed: usize,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Request lifecycle, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Fetched,
    Framed,
    Audioed,
    Transcribed,
    VisuallyAnalyzed,
    Synthesized,
    CleanedUp,
    /// Reported by the transport once the caller has its answer
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Fetched => "fetched",
            Stage::Framed => "framed",
            Stage::Audioed => "audioed",
            Stage::Transcribed => "transcribed",
            Stage::VisuallyAnalyzed => "visually-analyzed",
            Stage::Synthesized => "synthesized",
            Stage::CleanedUp => "cleaned-up",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Logs stage transitions and reports them to an observer
struct StageTracker<'a> {
    started: Instant,
    observer: &'a (dyn Fn(Stage) + Send + Sync),
}

impl<'a> StageTracker<'a> {
    fn new(observer: &'a (dyn Fn(Stage) + Send + Sync)) -> Self {
        Self {
            started: Instant::now(),
            observer,
        }
    }

    fn advance(&self, stage: Stage) {
        tracing::info!(
            stage = %stage,
            elapsed = %format_duration(self.started.elapsed().as_secs_f64()),
            "Pipeline stage reached"
        );
        (self.observer)(stage);
    }
}

/// Runs download, extraction and inference for one URL at a time per call
pub struct Orchestrator {
    fetcher: MediaFetcher,
    sampler: FrameSampler,
    audio: AudioExtractor,
    insight: InsightEngine,
    temp_root: PathBuf,
    frame_interval: f64,
    admission: Option<Arc<Semaphore>>,
}

impl Orchestrator {
    /// Build the pipeline with yt-dlp, ffmpeg and the OpenAI client
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let backend = OpenAiClient::new(&config.inference.base_url, api_key)
            .context("Failed to create inference client")?;

        Ok(Self::with_collaborators(
            config,
            Arc::new(YtDlpDownloader::new(&config.media.yt_dlp_path)),
            Arc::new(FfmpegTranscoder::new(&config.media.ffmpeg_path)),
            Arc::new(backend),
        ))
    }

    /// Build the pipeline around explicit collaborators
    pub fn with_collaborators(
        config: &Config,
        downloader: Arc<dyn VideoDownloader>,
        transcoder: Arc<dyn Transcoder>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        let media = &config.media;
        let admission = match config.app.max_concurrent_jobs {
            0 => None,
            limit => Some(Arc::new(Semaphore::new(limit))),
        };

        Self {
            fetcher: MediaFetcher::new(downloader, PlatformRegistry::new(), media),
            sampler: FrameSampler::new(Arc::clone(&transcoder), media.frame_size, media.max_frames),
            audio: AudioExtractor::new(transcoder, media.audio_sample_rate),
            insight: InsightEngine::new(backend, config.inference.clone()),
            temp_root: config.temp_root(),
            frame_interval: media.frame_interval,
            admission,
        }
    }

    pub fn registry(&self) -> &PlatformRegistry {
        self.fetcher.registry()
    }

    /// Analyze `url` with the configured frame interval
    pub async fn analyze(&self, url: &str) -> PipelineResult<AnalysisReport> {
        self.analyze_observed(url, self.frame_interval, |_| {}).await
    }

    /// Analyze `url`, calling `observer` as each stage completes
    pub async fn analyze_observed<F>(&self, url: &str, interval: f64, observer: F) -> PipelineResult<AnalysisReport>
    where
        F: Fn(Stage) + Send + Sync,
    {
        let url = url.trim();
        if url.is_empty() {
            return Err(AnalyzerError::MissingInput);
        }
        check_interval(interval)?;

        let _permit = match &self.admission {
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        };

        let tracker = StageTracker::new(&observer);
        tracker.advance(Stage::Received);

        let mut workspace = Workspace::create(&self.temp_root)?;
        let outcome = self.run_stages(url, interval, &mut workspace, &tracker).await;

        let cleanup = workspace.release();
        if cleanup.failed > 0 {
            tracing::warn!("{} temporary file(s) could not be removed", cleanup.failed);
        }
        tracker.advance(Stage::CleanedUp);

        if let Err(e) = &outcome {
            tracing::error!(kind = e.code(), "Analysis failed for {}: {}", url, e);
        }
        outcome
    }

    async fn run_stages(
        &self,
        url: &str,
        interval: f64,
        workspace: &mut Workspace,
        tracker: &StageTracker<'_>,
    ) -> PipelineResult<AnalysisReport> {
        let dest = workspace.path().to_path_buf();

        let video = self.fetcher.fetch(url, &dest).await?;
        let video_path = video.path.clone();
        workspace.register(video);
        if let Ok(metadata) = fs_err::metadata(&video_path) {
            tracing::info!("Video size: {}", format_file_size(metadata.len()));
        }
        tracker.advance(Stage::Fetched);

        let frames = self.sampler.sample(&video_path, interval, &dest).await?;
        let frame_paths = frames.paths();
        workspace.register(frames.dir);
        for frame in frames.frames {
            workspace.register(frame);
        }
        tracker.advance(Stage::Framed);

        let audio = self.audio.extract(&video_path, &dest).await?;
        let audio_path = audio.path.clone();
        workspace.register(audio);
        tracker.advance(Stage::Audioed);

        let transcript = self.insight.transcribe(&audio_path).await?;
        tracker.advance(Stage::Transcribed);

        let visual_analysis = self.insight.describe_visuals(&frame_paths, &transcript).await?;
        tracker.advance(Stage::VisuallyAnalyzed);

        let final_analysis = self.insight.synthesize(&transcript, &visual_analysis).await?;
        tracker.advance(Stage::Synthesized);

        Ok(AnalysisReport {
            video_url: url.to_string(),
            transcript,
            visual_analysis,
            final_analysis,
            frames_extracted: frame_paths.len(),
            frames_analyzed: frame_paths.len().min(self.insight.vision_frame_limit()),
            completed_at: chrono::Utc::now(),
        })
    }
}
