use serde::Serialize;

use crate::utils::extract_domain;

/// Download settings for one family of sites
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub name: String,

    /// Host suffixes this profile applies to
    pub domains: Vec<String>,

    /// Resolution ceiling for the primary attempt (config default when `None`)
    pub max_height: Option<u32>,

    /// Replaces the configured user agent
    pub user_agent: Option<String>,

    /// Extra request headers, `(name, value)`
    pub headers: Vec<(String, String)>,

    /// Values for yt-dlp's `--extractor-args`
    pub extractor_args: Vec<String>,

    /// Site generally refuses anonymous downloads
    pub needs_cookies: bool,
}

impl PlatformProfile {
    pub fn new(name: impl Into<String>, domains: &[&str]) -> Self {
        Self {
            name: name.into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            max_height: None,
            user_agent: None,
            headers: Vec::new(),
            extractor_args: Vec::new(),
            needs_cookies: false,
        }
    }

    /// Fallback used when no domain matches
    pub fn generic() -> Self {
        Self::new("Generic", &[])
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_extractor_arg(mut self, arg: &str) -> Self {
        self.extractor_args.push(arg.to_string());
        self
    }

    pub fn with_cookies(mut self) -> Self {
        self.needs_cookies = true;
        self
    }

    /// Does `host` equal one of the domains or sit below one of them
    fn matches_host(&self, host: &str) -> bool {
        self.domains.iter().any(|domain| {
            host == domain || host.ends_with(&format!(".{}", domain))
        })
    }
}

/// Maps URLs to platform profiles
pub struct PlatformRegistry {
    profiles: Vec<PlatformProfile>,
    generic: PlatformProfile,
}

impl PlatformRegistry {
    /// Create a new registry with the built-in profiles
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.profiles.push(
            PlatformProfile::new("TikTok", &["tiktok.com"])
                .with_header("Referer", "https://www.tiktok.com/")
                .with_extractor_arg("tiktok:webpage_url_basename=video"),
        );
        registry.profiles.push(
            PlatformProfile::new("Instagram", &["instagram.com"]).with_cookies(),
        );
        registry.profiles.push(
            PlatformProfile::new("YouTube", &["youtube.com", "youtu.be"]).with_max_height(480),
        );
        registry.profiles.push(PlatformProfile::new("Twitter/X", &["twitter.com", "x.com"]));

        registry
    }

    /// Registry with only the generic profile
    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
            generic: PlatformProfile::generic(),
        }
    }

    /// Register a profile; it takes precedence over earlier registrations
    pub fn register(&mut self, profile: PlatformProfile) {
        self.profiles.insert(0, profile);
    }

    /// Profile for `url`, the generic one if nothing matches
    pub fn lookup(&self, url: &str) -> &PlatformProfile {
        let found = match extract_domain(url) {
            Some(host) => {
                let host = host.to_lowercase();
                self.profiles.iter().find(|p| p.matches_host(&host))
            }
            // unparseable input: fall back to substring matching
            None => {
                let lower = url.to_lowercase();
                self.profiles
                    .iter()
                    .find(|p| p.domains.iter().any(|d| lower.contains(d.as_str())))
            }
        };

        found.unwrap_or(&self.generic)
    }

    /// All profiles, the generic one last
    pub fn profiles(&self) -> impl Iterator<Item = &PlatformProfile> {
        self.profiles.iter().chain(std::iter::once(&self.generic))
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
