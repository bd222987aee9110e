//! Fakes standing in for yt-dlp, ffmpeg and the inference API in tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::extractors::{DownloadOptions, VideoDownloader};
use crate::insight::{ChatRequest, InferenceBackend};
use crate::media::Transcoder;
use crate::Result;

/// Default configuration rooted at `temp_root`, with a dummy API key
pub fn test_config(temp_root: &Path) -> Config {
    let mut config = Config::default();
    config.media.temp_dir = Some(temp_root.to_path_buf());
    config.inference.api_key = Some("sk-test".to_string());
    config
}

/// Minimal PCM WAV file
pub fn wav_bytes(channels: u16, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
    for _ in 0..4 * channels {
        writer.write_sample(0i16).expect("wav sample");
    }
    writer.finalize().expect("finalize wav");
    cursor.into_inner()
}

/// A stand-in video whose only content is its duration, read back by [`FakeFfmpeg`]
pub fn write_video(dir: &Path, duration_secs: f64) -> PathBuf {
    let path = dir.join(format!("source_{}.mp4", uuid::Uuid::new_v4().simple()));
    fs_err::write(&path, format!("duration={}", duration_secs)).expect("write fake video");
    path
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Plays yt-dlp: fails the first `failures.len()` calls, then writes a video
pub struct FakeDownloader {
    failures: Vec<String>,
    duration_secs: f64,
    calls: Arc<Mutex<Vec<DownloadOptions>>>,
}

impl FakeDownloader {
    /// Downloads a clip of the given length on the first attempt
    pub fn clip(duration_secs: f64) -> Self {
        Self {
            failures: Vec::new(),
            duration_secs,
            calls: Arc::default(),
        }
    }

    /// Both the primary and the fallback attempt fail
    pub fn failing(primary: &str, fallback: &str) -> Self {
        Self {
            failures: vec![primary.to_string(), fallback.to_string()],
            duration_secs: 0.0,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<DownloadOptions>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl VideoDownloader for FakeDownloader {
    async fn download(&self, _url: &str, options: &DownloadOptions) -> Result<()> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(options.clone());
            calls.len() - 1
        };
        let template = options.output_template.to_string_lossy().into_owned();

        if let Some(reason) = self.failures.get(attempt) {
            fs_err::write(template.replace("%(ext)s", "mp4.part"), b"partial")?;
            anyhow::bail!("{}", reason);
        }

        fs_err::write(
            template.replace("%(ext)s", "mp4"),
            format!("duration={}", self.duration_secs),
        )?;
        Ok(())
    }
}

/// Plays ffmpeg: writes frames or a WAV file according to the arguments
pub struct FakeFfmpeg {
    /// Stop at `-frames:v` like the real tool does
    pub honor_frame_limit: bool,
}

impl Default for FakeFfmpeg {
    fn default() -> Self {
        Self {
            honor_frame_limit: true,
        }
    }
}

#[async_trait]
impl Transcoder for FakeFfmpeg {
    async fn run(&self, args: &[String]) -> Result<()> {
        let input = value_after(args, "-i").ok_or_else(|| anyhow::anyhow!("no input"))?;
        let content = fs_err::read_to_string(input)?;
        let duration: f64 = content
            .trim()
            .strip_prefix("duration=")
            .ok_or_else(|| anyhow::anyhow!("{}: Invalid data found when processing input", input))?
            .parse()?;
        let output = args.last().ok_or_else(|| anyhow::anyhow!("no output"))?;

        if args.iter().any(|a| a == "-vn") {
            let rate: u32 = value_after(args, "-ar").unwrap_or("44100").parse()?;
            let channels: u16 = value_after(args, "-ac").unwrap_or("2").parse()?;
            fs_err::write(output, wav_bytes(channels, rate))?;
            return Ok(());
        }

        let interval: f64 = value_after(args, "-vf")
            .and_then(|vf| vf.strip_prefix("fps=1/"))
            .ok_or_else(|| anyhow::anyhow!("no fps filter"))?
            .parse()?;
        let mut count = (duration / interval).ceil() as usize;
        if self.honor_frame_limit {
            if let Some(limit) = value_after(args, "-frames:v") {
                count = count.min(limit.parse()?);
            }
        }

        for i in 1..=count {
            fs_err::write(output.replace("%03d", &format!("{:03}", i)), [0xFF, 0xD8, 0xFF, 0xD9])?;
        }
        Ok(())
    }
}

/// Plays the inference API with fixed non-empty answers
#[derive(Default)]
pub struct FakeInference {
    /// Images attached to each chat request, in call order
    pub images_per_chat: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl InferenceBackend for FakeInference {
    async fn transcribe(&self, _model: &str, _file_name: &str, audio: Vec<u8>) -> Result<String> {
        anyhow::ensure!(audio.starts_with(b"RIFF"), "expected a WAV upload");
        Ok("Three tricks nobody tells you about".to_string())
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let images = request.image_count();
        self.images_per_chat.lock().unwrap().push(images);
        if images > 0 {
            Ok(format!("Fast cuts across {} frames", images))
        } else {
            Ok("Summary: a punchy list video".to_string())
        }
    }
}
