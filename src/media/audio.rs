use hound::{SampleFormat, WavSpec};
use std::path::Path;
use std::sync::Arc;

use super::{require_file, AssetKind, MediaAsset, Transcoder};
use crate::{AnalyzerError, PipelineResult};

/// Extracts a mono PCM WAV track suitable for speech-to-text
pub struct AudioExtractor {
    transcoder: Arc<dyn Transcoder>,
    sample_rate: u32,
}

impl AudioExtractor {
    pub fn new(transcoder: Arc<dyn Transcoder>, sample_rate: u32) -> Self {
        Self {
            transcoder,
            sample_rate,
        }
    }

    /// Strip the video stream, downmix to one channel and resample
    pub async fn extract(&self, video_path: &Path, dest_dir: &Path) -> PipelineResult<MediaAsset> {
        require_file(video_path)?;

        let audio = MediaAsset::reserve(AssetKind::Audio, dest_dir, Some("wav"));
        let args = vec![
            "-i".to_string(),
            video_path.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-y".to_string(),
            audio.path.to_string_lossy().into_owned(),
        ];

        self.transcoder
            .run(&args)
            .await
            .map_err(|e| AnalyzerError::ExtractionFailure(format!("Failed to extract audio: {:#}", e)))?;

        if !audio.path.is_file() {
            return Err(AnalyzerError::ExtractionFailure(format!(
                "Audio extraction produced no file at {}",
                audio.path.display()
            )));
        }

        let spec = read_wav_spec(&audio.path).map_err(|e| {
            AnalyzerError::ExtractionFailure(format!("Unreadable audio output: {}", e))
        })?;

        if spec.sample_format != SampleFormat::Int
            || spec.bits_per_sample != 16
            || spec.channels != 1
            || spec.sample_rate != self.sample_rate
        {
            return Err(AnalyzerError::ExtractionFailure(format!(
                "Expected mono {} Hz 16-bit PCM, got {} channel(s) at {} Hz ({} bits, {:?})",
                self.sample_rate, spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
            )));
        }

        tracing::info!("Extracted audio: {}", audio.path.display());
        Ok(audio)
    }
}

/// Stream parameters from a WAV file header
pub fn read_wav_spec(path: &Path) -> hound::Result<WavSpec> {
    Ok(hound::WavReader::open(path)?.spec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ffmpeg::MockTranscoder;
    use crate::test_support::{wav_bytes, write_video, FakeFfmpeg};

    fn extractor(transcoder: impl Transcoder + 'static) -> AudioExtractor {
        AudioExtractor::new(Arc::new(transcoder), 16000)
    }

    #[test]
    fn test_read_wav_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        fs_err::write(&path, wav_bytes(1, 16000)).unwrap();

        let spec = read_wav_spec(&path).unwrap();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_read_wav_spec_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        fs_err::write(&path, b"ID3\x03 not a wav file").unwrap();

        assert!(read_wav_spec(&path).is_err());
    }

    #[tokio::test]
    async fn test_garbage_output_is_an_extraction_failure() {
        let root = tempfile::tempdir().unwrap();
        let video = write_video(root.path(), 10.0);
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_run().returning(|args: &[String]| {
            let out = args.last().expect("output path");
            fs_err::write(out, b"RIFF\0\0\0\0WAVE")?;
            Ok(())
        });

        let err = extractor(transcoder)
            .extract(&video, root.path())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "extraction_failure");
        assert!(err.to_string().contains("Unreadable audio output"));
    }

    #[tokio::test]
    async fn test_extracts_mono_16k_wav() {
        let root = tempfile::tempdir().unwrap();
        let video = write_video(root.path(), 10.0);

        let audio = extractor(FakeFfmpeg::default())
            .extract(&video, root.path())
            .await
            .unwrap();

        assert_eq!(audio.kind, AssetKind::Audio);
        let spec = read_wav_spec(&audio.path).unwrap();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
    }

    #[tokio::test]
    async fn test_missing_output_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let video = write_video(root.path(), 10.0);
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_run().times(1).returning(|_| Ok(()));

        let err = extractor(transcoder)
            .extract(&video, root.path())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "extraction_failure");
        assert!(err.to_string().contains("no file"));
    }

    #[tokio::test]
    async fn test_stereo_output_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let video = write_video(root.path(), 10.0);
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_run().returning(|args: &[String]| {
            let out = args.last().expect("output path");
            fs_err::write(out, wav_bytes(2, 44100))?;
            Ok(())
        });

        let err = extractor(transcoder)
            .extract(&video, root.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Expected mono 16000 Hz"));
    }

    #[tokio::test]
    async fn test_ffmpeg_error_is_wrapped() {
        let root = tempfile::tempdir().unwrap();
        let video = write_video(root.path(), 10.0);
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_run()
            .returning(|_| Err(anyhow::anyhow!("Output file #0 does not contain any stream")));

        let err = extractor(transcoder)
            .extract(&video, root.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to extract audio"));
        assert!(err.to_string().contains("does not contain any stream"));
    }
}
