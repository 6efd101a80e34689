use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::learn::Chapter;
use crate::modifiers::{modifier_suffix, Category};

/// One image generation request as submitted by the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default, alias = "prompt")]
    pub base_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
}

impl GenerationRequest {
    pub fn new(base_prompt: impl Into<String>) -> Self {
        Self { base_prompt: base_prompt.into(), ..Self::default() }
    }

    pub fn style(mut self, value: impl Into<String>) -> Self {
        self.style = Some(value.into());
        self
    }

    pub fn camera_angle(mut self, value: impl Into<String>) -> Self {
        self.camera_angle = Some(value.into());
        self
    }

    pub fn lighting(mut self, value: impl Into<String>) -> Self {
        self.lighting = Some(value.into());
        self
    }

    pub fn compose(&self) -> String {
        compose(self)
    }
}

/// basePrompt followed by the style, camera angle and lighting suffixes, in that order.
pub fn compose(req: &GenerationRequest) -> String {
    let slots = [
        (Category::Style, req.style.as_deref()),
        (Category::CameraAngle, req.camera_angle.as_deref()),
        (Category::Lighting, req.lighting.as_deref()),
    ];
    let mut out = req.base_prompt.clone();
    for (category, value) in slots {
        if let Some(v) = value {
            out.push_str(modifier_suffix(category, v));
        }
    }
    out
}

pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Answer questions concisely, clearly, and with a touch of creativity. Use markdown for formatting and include relevant emojis to enhance communication.";

pub fn ai_enhance_instruction(prompt: &str) -> String {
    format!(
        "You are an expert in crafting vivid and imaginative prompts for an AI image generator. You will receive a basic prompt. \
Your task is to expand it into a highly descriptive, creative, and visually rich prompt, adding detail about the subject, background, mood and colors.
But your enhanced prompt should not be too long. Maximum 50 words.
Do not include any information about lighting, camera angle or style as these will be added separately.

Input Prompt: {prompt}
Enhanced Prompt:"
    )
}

pub fn chapter_list_instruction(topic: &str) -> String {
    format!(
        "You will receive the name of a topic and you need to generate 5-10 chapters for this topic along with a one liner description.
The topic name is found in the following prompt.
Do not include the chapter number in chapter titles.
Prompt: {topic}"
    )
}

pub fn chapter_content_instruction(selected: &Chapter, chapters: &[Chapter]) -> String {
    let selected = json!({ "title": selected.title, "description": selected.description });
    let all: Vec<_> = chapters
        .iter()
        .map(|c| json!({ "title": c.title, "description": c.description }))
        .collect();
    let all = serde_json::Value::Array(all);
    format!(
        "You are given a list of chapters, and one chapter has been selected from this list. Your task is to generate both a **Theory** and an **Assignment** section for the selected chapter.

### 1. Theory Section
- Write a clear, concise, and well-structured explanation of the selected chapter's topic.
- Format the content using **Markdown** to create a visually organized and hierarchical structure (e.g. headings, subheadings, bullet points).
- Do **not** include the chapter name or its short description; jump straight into the explanation.
- At the end of the theory, include a list of **valuable learning resources**, which may include:
  - YouTube videos
  - Documentation links
  - Articles or blogs

### 2. Assignment Section
- Create **3 to 8 questions** based on the topic.
- Each question should include a **concise answer**.
- At least **2-3 questions** should encourage the learner to do **additional self-research** while staying on topic. Indicate this explicitly in the question or its answer.

### Input
- Selected chapter: {selected}
- Full chapter list: {all}"
    )
}
