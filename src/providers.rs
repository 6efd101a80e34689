use anyhow::{bail, Context};
use async_trait::async_trait;
use image::{ImageBuffer, Rgba};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use thiserror::Error;

use crate::config::{AppConfig, ImageProviderKind, TextProviderKind};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("rate limited by remote endpoint")]
    RateLimited,
    #[error("http error: {0}")]
    Http(String),
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited;
    }
    let mut msg = format!("API request failed with status {status}");
    if !body.is_empty() {
        msg.push_str(": ");
        msg.push_str(body);
    }
    ProviderError::Http(msg)
}

/// Turns a composed prompt into an image data URI.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
    fn name(&self) -> &'static str;
}

/// POSTs `{"prompt": ...}` to a configured endpoint that answers with a plain-text data URI.
pub struct HttpImageProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpImageProvider {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[derive(Serialize)]
struct ImageReq<'a> {
    prompt: &'a str,
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    fn name(&self) -> &'static str { "http" }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let resp = self.client.post(&self.url).json(&ImageReq { prompt }).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status, ""));
        }
        let body = resp.text().await?;
        let body = body.trim();
        crate::io::parse_data_uri(body).map_err(|e| ProviderError::Fatal(e.to_string()))?;
        Ok(body.to_string())
    }
}

/// Offline provider: draws a small pattern keyed on the prompt and returns it as a PNG data URI.
pub struct MockProvider;

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &'static str { "mock" }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        // XOR pattern tinted by the prompt's byte sum
        let w = 256u32;
        let h = 256u32;
        let tint = prompt.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = ((x ^ y) & 0xFF) as u8;
            *p = Rgba([v, 255 - v, tint, 255]);
        }
        let mut png_bytes: Vec<u8> = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| ProviderError::Fatal(format!("encode error: {e}")))?;
        Ok(crate::io::to_data_uri("image/png", &png_bytes))
    }
}

/// One call to a language model. With `response_schema` set the reply must be JSON.
#[derive(Debug, Clone, Copy)]
pub struct TextPrompt<'a> {
    pub model: &'a str,
    pub system: Option<&'a str>,
    pub prompt: &'a str,
    pub response_schema: Option<&'a Value>,
}

#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, req: TextPrompt<'_>) -> Result<String, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Google Generative Language `generateContent` REST client.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key, base_url })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentReq<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}
#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}
#[derive(Deserialize)]
struct GenerateContentResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}
#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}
#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl TextModel for GeminiModel {
    fn name(&self) -> &'static str { "gemini" }

    async fn generate(&self, req: TextPrompt<'_>) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            req.model
        );
        let body = GenerateContentReq {
            system_instruction: req.system.map(|s| Content { role: None, parts: vec![Part { text: s }] }),
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: req.prompt }] }],
            generation_config: req.response_schema.map(|schema| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };
        tracing::debug!(model = req.model, structured = req.response_schema.is_some(), "generateContent");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }
        let parsed: GenerateContentResp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("unreadable response: {e}")))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::Fatal("response contained no candidate text".into()));
        }
        Ok(text)
    }
}

/// Scripted stand-in for a language model.
///
/// Replies are consumed in order. Once exhausted it echoes free-text prompts and
/// answers structured calls with a minimal document shaped by the requested schema.
#[derive(Default)]
pub struct MockModel {
    scripted: Mutex<VecDeque<Result<String, ProviderError>>>,
    seen: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.scripted.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, err: ProviderError) -> Self {
        self.scripted.lock().push_back(Err(err));
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl TextModel for MockModel {
    fn name(&self) -> &'static str { "mock" }

    async fn generate(&self, req: TextPrompt<'_>) -> Result<String, ProviderError> {
        self.seen.lock().push(req.prompt.to_string());
        if let Some(next) = self.scripted.lock().pop_front() {
            return next;
        }
        Ok(match req.response_schema {
            Some(schema) => sample_for_schema(schema).to_string(),
            None => format!("(mock) {}", req.prompt),
        })
    }
}

fn sample_for_schema(schema: &Value) -> Value {
    let kind = schema.get("type").and_then(Value::as_str).unwrap_or("STRING");
    match kind.to_ascii_uppercase().as_str() {
        "OBJECT" => {
            let mut map = serde_json::Map::new();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (key, prop) in props {
                    map.insert(key.clone(), sample_for_schema(prop));
                }
            }
            Value::Object(map)
        }
        "ARRAY" => Value::Array(schema.get("items").map(sample_for_schema).into_iter().collect()),
        "INTEGER" | "NUMBER" => json!(0),
        "BOOLEAN" => json!(false),
        _ => json!("sample"),
    }
}

pub fn build_image_provider(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ImageProvider>> {
    Ok(match cfg.image.kind {
        ImageProviderKind::Http => {
            let Some(url) = cfg.image.url.clone().filter(|u| !u.trim().is_empty()) else {
                bail!("image.url (IMAGE_GENERATION_API_URL) is required for the http image provider; set it or use PROMPTFORGE_IMAGE_PROVIDER=mock");
            };
            Arc::new(HttpImageProvider::new(url, cfg.timeout())?)
        }
        ImageProviderKind::Mock => Arc::new(MockProvider),
    })
}

pub fn build_text_model(cfg: &AppConfig) -> anyhow::Result<Arc<dyn TextModel>> {
    Ok(match cfg.text.kind {
        TextProviderKind::Gemini => {
            let key_env = cfg.text.api_key_env.as_str();
            let key = std::env::var(key_env).with_context(|| format!("{key_env} not set"))?;
            Arc::new(GeminiModel::new(key, cfg.text.base_url.clone(), cfg.timeout())?)
        }
        TextProviderKind::Mock => Arc::new(MockModel::new()),
    })
}
