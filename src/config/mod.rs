use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Desktop browser identity sent to video sites
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Download and extraction settings
    pub media: MediaConfig,

    /// Hosted inference settings
    pub inference: InferenceConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root for per-request workspaces (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,

    /// Seconds between sampled frames
    pub frame_interval: f64,

    /// Maximum frames kept per video
    pub max_frames: usize,

    /// Edge length of the square frame images
    pub frame_size: u32,

    /// Sample rate of the extracted audio
    pub audio_sample_rate: u32,

    /// Default resolution ceiling for the primary download attempt
    pub max_height: u32,

    /// Format used when the primary download attempt fails
    pub fallback: FallbackPolicy,

    /// Upstream proxy for the downloader
    pub proxy: Option<String>,

    /// Netscape cookie jar for sites that need a session
    pub cookies_file: Option<PathBuf>,

    pub user_agent: String,

    /// Download and fragment retries handed to yt-dlp
    pub retries: u32,

    pub yt_dlp_path: String,
    pub ffmpeg_path: String,
}

/// What to ask the downloader for after the bounded-resolution attempt fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Lowest quality the site offers
    Lowest,
    /// Highest quality the site offers
    Highest,
    /// No second attempt
    Disabled,
    /// Explicit yt-dlp format selector
    Custom(String),
}

impl FallbackPolicy {
    /// yt-dlp format selector for the fallback attempt, `None` when disabled
    pub fn format_selector(&self) -> Option<String> {
        match self {
            FallbackPolicy::Lowest => Some("worst/best".to_string()),
            FallbackPolicy::Highest => Some("best/worst".to_string()),
            FallbackPolicy::Disabled => None,
            FallbackPolicy::Custom(selector) => Some(selector.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// API credential, normally taken from `OPENAI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub transcription_model: String,
    pub vision_model: String,
    pub synthesis_model: String,
    pub vision_max_tokens: u32,
    pub synthesis_max_tokens: u32,

    /// Image detail level requested for frames
    pub image_detail: String,

    /// Frames sent to the vision model per request
    pub max_vision_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Opt-in cap on concurrent analyses (0 = unbounded)
    pub max_concurrent_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            frame_interval: 1.5,
            max_frames: 100,
            frame_size: 512,
            audio_sample_rate: 16000,
            max_height: 480,
            fallback: FallbackPolicy::Lowest,
            proxy: None,
            cookies_file: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retries: 3,
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            transcription_model: "whisper-1".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            synthesis_model: "gpt-4o".to_string(),
            vision_max_tokens: 1000,
            synthesis_max_tokens: 1500,
            image_detail: "low".to_string(),
            max_vision_frames: 6,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 0,
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults) and apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-analyzer").join("config.yaml"))
    }

    /// Apply `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `PROXY_URL` and `PORT`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.inference.api_key = Some(key);
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.inference.base_url = base_url;
        }
        if let Some(proxy) = lookup("PROXY_URL").filter(|p| !p.trim().is_empty()) {
            self.media.proxy = Some(proxy);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.media.frame_interval.is_finite() && self.media.frame_interval > 0.0) {
            anyhow::bail!("media.frame_interval must be a positive number of seconds");
        }
        if self.media.max_frames == 0 {
            anyhow::bail!("media.max_frames must be at least 1");
        }
        if self.media.frame_size == 0 {
            anyhow::bail!("media.frame_size must be at least 1");
        }
        if self.inference.max_vision_frames == 0 {
            anyhow::bail!("inference.max_vision_frames must be at least 1");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port must not be 0");
        }
        if let FallbackPolicy::Custom(selector) = &self.media.fallback {
            if selector.trim().is_empty() {
                anyhow::bail!("media.fallback custom format must not be empty");
            }
        }
        Ok(())
    }

    /// API credential, required before any inference client is built
    pub fn require_api_key(&self) -> Result<&str> {
        self.inference
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }

    /// Root directory for per-request workspaces
    pub fn temp_root(&self) -> PathBuf {
        self.media
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Temp Dir: {}", self.temp_root().display());
        println!("  Frame Interval: {}s", self.media.frame_interval);
        println!("  Max Frames: {}", self.media.max_frames);
        println!("  Max Height: {}p", self.media.max_height);
        println!("  Fallback: {:?}", self.media.fallback);
        if let Some(proxy) = &self.media.proxy {
            println!("  Proxy: {}", redact_url(proxy));
        }
        println!("  API Base: {}", self.inference.base_url);
        println!(
            "  API Key: {}",
            self.inference
                .api_key
                .as_deref()
                .map(redact)
                .unwrap_or_else(|| "(not set)".to_string())
        );
        println!(
            "  Models: {} / {} / {}",
            self.inference.transcription_model,
            self.inference.vision_model,
            self.inference.synthesis_model
        );
        println!("  Max Concurrent Jobs: {}", self.app.max_concurrent_jobs);
    }
}

/// Keep only the last four characters of a secret
fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Mask the credentials of a URL, leaving scheme and host readable
fn redact_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return "****".to_string();
    };
    if url.username().is_empty() && url.password().is_none() {
        return url.to_string();
    }
    if url.set_username("****").is_err() || url.set_password(None).is_err() {
        return "****".to_string();
    }
    url.to_string()
}
