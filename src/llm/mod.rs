//! Boundary to the external text-generation service.

#[cfg(feature = "groq")]
pub mod client;
pub mod prompts;
#[cfg(feature = "groq")]
pub mod types;

#[cfg(feature = "groq")]
pub use client::*;

use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// A text-in/text-out generation service.
///
/// Implementations make exactly one attempt per call. Output is untrusted: callers
/// trim and normalize whatever comes back.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>|<think\s*/>").unwrap());

static REASONING_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<reasoning>.*?</reasoning>").unwrap());

static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Removes reasoning artifacts some models emit and trims the response.
pub fn clean_response(response: &str) -> String {
    let cleaned = THINK_BLOCK.replace_all(response, "");
    let cleaned = REASONING_BLOCK.replace_all(&cleaned, "");
    let cleaned = cleaned.replace("\r\n", "\n");
    EXTRA_NEWLINES
        .replace_all(cleaned.trim(), "\n\n")
        .into_owned()
}
