//! Learning paths: a chapter list per topic, and theory plus assignments per chapter.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ops::RangeInclusive;
use tracing::{info, warn};

use crate::config::ModelCfg;
use crate::errors::GenError;
use crate::generate::generate_object;
use crate::prompts::{chapter_content_instruction, chapter_list_instruction};
use crate::providers::TextModel;

/// Chapter count the model is asked for. Not enforced on the reply.
pub const CHAPTER_RANGE: RangeInclusive<usize> = 5..=10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub chapters: Vec<Chapter>,
}

impl LearningPath {
    /// 1-based lookup, matching the chapter numbers shown to the learner.
    pub fn chapter(&self, number: usize) -> Option<&Chapter> {
        number.checked_sub(1).and_then(|i| self.chapters.get(i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theory {
    pub description: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    #[serde(rename = "Theory")]
    pub theory: Theory,
    #[serde(rename = "Assignments")]
    pub assignments: Vec<Assignment>,
}

fn string_list() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

pub fn chapter_list_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "chapters": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["title", "description"]
                }
            }
        },
        "required": ["chapters"]
    })
}

pub fn chapter_content_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "Theory": {
                "type": "OBJECT",
                "properties": {
                    "description": { "type": "STRING" },
                    "resources": string_list()
                },
                "required": ["description", "resources"]
            },
            "Assignments": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "answer": { "type": "STRING" }
                    },
                    "required": ["question", "answer"]
                }
            }
        },
        "required": ["Theory", "Assignments"]
    })
}

pub async fn generate_path(model: &dyn TextModel, models: &ModelCfg, topic: &str) -> Result<LearningPath, GenError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(GenError::EmptyPrompt);
    }
    let path: LearningPath =
        generate_object(model, &models.learn, &chapter_list_instruction(topic), &chapter_list_schema()).await?;
    if !CHAPTER_RANGE.contains(&path.chapters.len()) {
        warn!(topic, chapters = path.chapters.len(), "chapter count outside requested range");
    }
    info!(topic, chapters = path.chapters.len(), "learning path generated");
    Ok(path)
}

/// Content for chapter `number` (1-based), generated with the whole path as context.
pub async fn generate_chapter(
    model: &dyn TextModel,
    models: &ModelCfg,
    path: &LearningPath,
    number: usize,
) -> Result<(Chapter, ChapterContent), GenError> {
    let chapter = path
        .chapter(number)
        .ok_or(GenError::ChapterNotFound { number, total: path.chapters.len() })?
        .clone();
    let prompt = chapter_content_instruction(&chapter, &path.chapters);
    let content: ChapterContent =
        generate_object(model, &models.learn, &prompt, &chapter_content_schema()).await?;
    info!(number, title = %chapter.title, assignments = content.assignments.len(), "chapter content generated");
    Ok((chapter, content))
}
