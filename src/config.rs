use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    Http,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextProviderKind {
    Gemini,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProviderCfg {
    pub kind: ImageProviderKind,
    #[serde(default)]
    pub url: Option<String>,
}

/// Model ids per experience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCfg {
    pub chat: String,
    pub learn: String,
    pub enhance: String,
}

impl Default for ModelCfg {
    fn default() -> Self {
        Self {
            chat: "gemini-1.5-flash-002".into(),
            learn: "gemini-1.5-flash-002".into(),
            enhance: "gemini-2.0-flash-001".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextProviderCfg {
    pub kind: TextProviderKind,
    pub api_key_env: String,
    pub base_url: String,
    pub models: ModelCfg,
}

impl Default for TextProviderCfg {
    fn default() -> Self {
        Self {
            kind: TextProviderKind::Gemini,
            api_key_env: "GOOGLE_GENERATIVE_AI_API_KEY".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            models: ModelCfg::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub state_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub image: ImageProviderCfg,
    pub text: TextProviderCfg,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            state_dir: PathBuf::from(".promptforge"),
            request_timeout_secs: 120,
            image: ImageProviderCfg { kind: ImageProviderKind::Http, url: None },
            text: TextProviderCfg::default(),
        }
    }
}

fn parse_kind<T: for<'de> Deserialize<'de>>(key: &str, raw: &str) -> Result<T> {
    serde_yaml::from_str(raw.trim()).with_context(|| format!("invalid value for {key}: {raw}"))
}

impl AppConfig {
    /// Defaults, then the YAML file (if any), then environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let txt = tokio::fs::read_to_string(p)
                    .await
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                serde_yaml::from_str(&txt).context("Failed to parse config YAML")?
            }
            None => AppConfig::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("PROMPTFORGE_BIND") { self.bind = v; }
        if let Some(v) = lookup("PROMPTFORGE_STATE_DIR") { self.state_dir = v.into(); }
        if let Some(v) = lookup("PROMPTFORGE_TIMEOUT_SECS") {
            self.request_timeout_secs = v.parse().with_context(|| format!("invalid PROMPTFORGE_TIMEOUT_SECS: {v}"))?;
        }
        if let Some(v) = lookup("PROMPTFORGE_IMAGE_PROVIDER") { self.image.kind = parse_kind("PROMPTFORGE_IMAGE_PROVIDER", &v)?; }
        if let Some(v) = lookup("IMAGE_GENERATION_API_URL") { self.image.url = Some(v); }
        if let Some(v) = lookup("PROMPTFORGE_TEXT_PROVIDER") { self.text.kind = parse_kind("PROMPTFORGE_TEXT_PROVIDER", &v)?; }
        if let Some(v) = lookup("PROMPTFORGE_API_KEY_ENV") { self.text.api_key_env = v; }
        if let Some(v) = lookup("PROMPTFORGE_API_BASE") { self.text.base_url = v; }
        if let Some(v) = lookup("PROMPTFORGE_CHAT_MODEL") { self.text.models.chat = v; }
        if let Some(v) = lookup("PROMPTFORGE_LEARN_MODEL") { self.text.models.learn = v; }
        if let Some(v) = lookup("PROMPTFORGE_ENHANCE_MODEL") { self.text.models.enhance = v; }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }
        if let Some(url) = &self.image.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("image.url must be an http(s) URL: {url}");
            }
        }
        for (name, model) in [
            ("chat", &self.text.models.chat),
            ("learn", &self.text.models.learn),
            ("enhance", &self.text.models.enhance),
        ] {
            if model.trim().is_empty() {
                bail!("text.models.{name} cannot be empty");
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Offline configuration backed by the mock providers.
    pub fn mock() -> Self {
        Self {
            image: ImageProviderCfg { kind: ImageProviderKind::Mock, url: None },
            text: TextProviderCfg { kind: TextProviderKind::Mock, ..TextProviderCfg::default() },
            ..Self::default()
        }
    }
}
