use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HIGHLIGHT_CLASS: &str = "bg-red-600";
pub const DEFAULT_SPOILER_CLASS: &str = "spoiler";
pub const DEFAULT_IMAGE_HOSTS: &[&str] = &["i.redd.it", "i.imgur.com", "preview.redd.it"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Class put on the span wrapping each match.
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Hosts whose links are turned into inline figures.
    pub image_hosts: Vec<String>,
    /// The only span class that is kept.
    pub spoiler_class: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            class: String::from(DEFAULT_HIGHLIGHT_CLASS),
        }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            image_hosts: DEFAULT_IMAGE_HOSTS.iter().map(|h| h.to_string()).collect(),
            spoiler_class: String::from(DEFAULT_SPOILER_CLASS),
        }
    }
}

impl RenderConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            log::warn!("Render config is empty, using defaults");
            return Ok(Self::default());
        }

        let mut config: Self =
            serde_json::from_str(content).context("Failed to parse render config")?;
        config.validate();
        log::info!(
            "Loaded render config with {} image host(s)",
            config.sanitize.image_hosts.len()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize render config")
    }

    /// Replaces unusable values with defaults. Returns whether anything changed.
    pub fn validate(&mut self) -> bool {
        let mut corrected = false;

        if self.highlight.class.trim().is_empty() {
            log::warn!("Empty highlight class, using default");
            self.highlight.class = String::from(DEFAULT_HIGHLIGHT_CLASS);
            corrected = true;
        }

        if self.sanitize.spoiler_class.trim().is_empty() {
            log::warn!("Empty spoiler class, using default");
            self.sanitize.spoiler_class = String::from(DEFAULT_SPOILER_CLASS);
            corrected = true;
        }

        let mut hosts: Vec<String> = Vec::with_capacity(self.sanitize.image_hosts.len());
        for host in &self.sanitize.image_hosts {
            let host = host.trim().to_ascii_lowercase();
            if host.is_empty() || hosts.contains(&host) {
                continue;
            }
            hosts.push(host);
        }
        if hosts != self.sanitize.image_hosts {
            log::warn!(
                "Normalized image hosts: {:?} -> {:?}",
                self.sanitize.image_hosts,
                hosts
            );
            self.sanitize.image_hosts = hosts;
            corrected = true;
        }

        if corrected {
            log::info!("Render config validation completed with corrections");
        }
        corrected
    }
}
