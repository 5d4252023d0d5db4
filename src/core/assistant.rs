//! Generative-text assistant abstractions

use crate::core::error::FetchError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// Reply used when the service answers without any text.
pub const EMPTY_REPLY: &str = "No response received";

#[async_trait]
pub trait AssistantProvider: Send + Sync {
    /// One independent request; no conversation state is kept.
    async fn ask(&self, prompt: &str) -> Result<String, FetchError>;

    /// Lazily yields text chunks. The stream is finite and cannot be
    /// restarted. A failure ends it with a single `"Error: ..."` chunk.
    fn ask_stream(&self, prompt: &str) -> BoxStream<'static, String>;
}

pub fn error_chunk(err: &FetchError) -> String {
    format!("Error: {err}")
}

pub fn forex_question_prompt(question: &str) -> String {
    format!(
        "You are a helpful forex and financial market assistant.\n\
         Answer the following question about forex, currency exchange, or financial markets.\n\
         Keep your answer concise, informative, and easy to understand.\n\
         \n\
         Question: {question}"
    )
}

pub fn pair_analysis_prompt(from: &str, to: &str, current_rate: f64) -> String {
    format!(
        "Provide a brief analysis of the {from}/{to} currency pair.\n\
         Current exchange rate: 1 {from} = {current_rate} {to}\n\
         \n\
         Include:\n\
         1. Brief overview of factors affecting this pair\n\
         2. Recent trends (general market knowledge)\n\
         3. Key economic indicators to watch\n\
         \n\
         Keep it concise (2-3 short paragraphs)."
    )
}

pub fn forex_tips_prompt() -> String {
    "Provide 5 important tips for someone interested in forex trading or currency exchange.\n\
     Keep each tip concise and practical."
        .to_string()
}
