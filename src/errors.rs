use thiserror::Error;

use crate::providers::ProviderError;

/// Failure of a single generation request. None of these are retried.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("prompt is required")]
    EmptyPrompt,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("response did not match schema: {0}")]
    Schema(String),
    #[error("chapter {number} not found (learning path has {total} chapters)")]
    ChapterNotFound { number: usize, total: usize },
    #[error("no learning path stored")]
    NoPath,
    #[error("store error: {0}")]
    Store(String),
}

impl GenError {
    pub fn store(e: anyhow::Error) -> Self {
        Self::Store(format!("{e:#}"))
    }
}
