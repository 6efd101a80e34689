use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ModelCfg;
use crate::errors::GenError;
use crate::prompts::{ai_enhance_instruction, GenerationRequest, CHAT_SYSTEM_PROMPT};
use crate::providers::{ImageProvider, TextModel, TextPrompt};

/// Returned in place of an image when the image endpoint fails.
pub const PLACEHOLDER_IMAGE: &str = "/alert.svg?height=512&width=512";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutcome {
    /// Data URI, or [`PLACEHOLDER_IMAGE`] when `fallback` is set.
    pub image: String,
    /// Composed prompt that was sent.
    pub prompt: String,
    pub fallback: bool,
}

pub async fn text(model: &dyn TextModel, models: &ModelCfg, req: &TextRequest) -> Result<String, GenError> {
    if req.prompt.trim().is_empty() {
        return Err(GenError::EmptyPrompt);
    }
    let model_id = req
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&models.chat);
    debug!(provider = model.name(), model = model_id, "generating text");
    let out = model
        .generate(TextPrompt {
            model: model_id,
            system: Some(CHAT_SYSTEM_PROMPT),
            prompt: &req.prompt,
            response_schema: None,
        })
        .await?;
    Ok(out)
}

pub async fn image(provider: &dyn ImageProvider, req: &GenerationRequest) -> Result<ImageOutcome, GenError> {
    if req.base_prompt.trim().is_empty() {
        return Err(GenError::EmptyPrompt);
    }
    let prompt = req.compose();
    info!(provider = provider.name(), prompt = %prompt, "generating image");
    match provider.generate(&prompt).await {
        Ok(image) => Ok(ImageOutcome { image, prompt, fallback: false }),
        Err(e) => {
            warn!(error = %e, "image generation failed, using placeholder");
            Ok(ImageOutcome { image: PLACEHOLDER_IMAGE.to_string(), prompt, fallback: true })
        }
    }
}

/// Model-backed rewrite of a short image prompt into a richer one.
pub async fn ai_enhance(model: &dyn TextModel, models: &ModelCfg, prompt: &str) -> Result<String, GenError> {
    if prompt.trim().is_empty() {
        return Err(GenError::EmptyPrompt);
    }
    let instruction = ai_enhance_instruction(prompt);
    let out = model
        .generate(TextPrompt {
            model: &models.enhance,
            system: None,
            prompt: &instruction,
            response_schema: None,
        })
        .await?;
    Ok(out.trim().to_string())
}

/// Structured call: the reply must deserialize into `T` or the request fails with `Schema`.
pub(crate) async fn generate_object<T: DeserializeOwned>(
    model: &dyn TextModel,
    model_id: &str,
    prompt: &str,
    schema: &Value,
) -> Result<T, GenError> {
    let raw = model
        .generate(TextPrompt { model: model_id, system: None, prompt, response_schema: Some(schema) })
        .await?;
    serde_json::from_str(raw.trim()).map_err(|e| {
        warn!(error = %e, "structured response rejected");
        GenError::Schema(e.to_string())
    })
}
