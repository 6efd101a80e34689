//! Prompt composition and generation back end for text chat, styled images and learning paths.

pub mod api;
pub mod config;
pub mod errors;
pub mod generate;
pub mod io;
pub mod learn;
pub mod modifiers;
pub mod prompts;
pub mod providers;
pub mod store;
