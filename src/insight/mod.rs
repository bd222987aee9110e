use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod openai;

pub use openai::{ChatMessage, ChatRequest, ContentPart, ImageUrl, InferenceBackend, MessageContent, OpenAiClient};

use crate::config::InferenceConfig;
use crate::{AnalyzerError, PipelineResult};

/// Prompt for the vision model; the transcript is appended in quotes
fn vision_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze these video frames along with the transcript. Focus on:

1. Visual hooks and attention-grabbing elements
2. Text overlays, graphics, or on-screen elements
3. Gestures, expressions, props, and visual storytelling
4. Scene changes and visual flow

Transcript: "{}"

Provide a detailed visual analysis focusing on what makes this video engaging."#,
        transcript
    )
}

fn synthesis_prompt(transcript: &str, visual_analysis: &str) -> String {
    format!(
        r#"Based on the following transcript and visual analysis of a video, provide:

1. A comprehensive summary of the video content
2. Key engaging elements (both audio and visual)
3. 5 creative variations or twists on this concept for new videos
4. Specific recommendations for recreating similar content

TRANSCRIPT:
{}

VISUAL ANALYSIS:
{}

Format your response with clear sections."#,
        transcript, visual_analysis
    )
}

/// Transcript, visual description and synthesis from the hosted models
pub struct InsightEngine {
    backend: Arc<dyn InferenceBackend>,
    settings: InferenceConfig,
}

impl InsightEngine {
    pub fn new(backend: Arc<dyn InferenceBackend>, settings: InferenceConfig) -> Self {
        Self { backend, settings }
    }

    /// Frames sent to the vision model per request
    pub fn vision_frame_limit(&self) -> usize {
        self.settings.max_vision_frames
    }

    /// Speech-to-text for the extracted audio track
    pub async fn transcribe(&self, audio_path: &Path) -> PipelineResult<String> {
        let audio = tokio::fs::read(audio_path).await.map_err(|e| {
            AnalyzerError::InferenceFailure(format!(
                "Audio transcription failed: cannot read {}: {}",
                audio_path.display(),
                e
            ))
        })?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        self.backend
            .transcribe(&self.settings.transcription_model, &file_name, audio)
            .await
            .map_err(|e| AnalyzerError::InferenceFailure(format!("Audio transcription failed: {:#}", e)))
    }

    /// Describe the first few frames in light of the transcript
    pub async fn describe_visuals(&self, frames: &[PathBuf], transcript: &str) -> PipelineResult<String> {
        let selected = &frames[..frames.len().min(self.settings.max_vision_frames)];

        let mut parts = vec![ContentPart::Text {
            text: vision_prompt(transcript),
        }];
        for frame in selected {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: encode_image(frame).await?,
                    detail: self.settings.image_detail.clone(),
                },
            });
        }

        tracing::debug!("Sending {} of {} frames for visual analysis", selected.len(), frames.len());

        let request = ChatRequest {
            model: self.settings.vision_model.clone(),
            messages: vec![ChatMessage::user(MessageContent::Parts(parts))],
            max_tokens: self.settings.vision_max_tokens,
        };

        self.backend
            .chat(request)
            .await
            .map_err(|e| AnalyzerError::InferenceFailure(format!("Frame analysis failed: {:#}", e)))
    }

    /// Combine transcript and visual analysis into the final write-up
    pub async fn synthesize(&self, transcript: &str, visual_analysis: &str) -> PipelineResult<String> {
        let request = ChatRequest {
            model: self.settings.synthesis_model.clone(),
            messages: vec![ChatMessage::user(MessageContent::Text(synthesis_prompt(
                transcript,
                visual_analysis,
            )))],
            max_tokens: self.settings.synthesis_max_tokens,
        };

        self.backend
            .chat(request)
            .await
            .map_err(|e| AnalyzerError::InferenceFailure(format!("Combined analysis failed: {:#}", e)))
    }
}

/// JPEG file as a `data:` URL
async fn encode_image(path: &Path) -> PipelineResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AnalyzerError::InferenceFailure(format!("Image encoding failed: {}: {}", path.display(), e))
    })?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}
