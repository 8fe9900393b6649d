//! Summarization dispatcher backed by the Gemini `generateContent` API.
//!
//! The dispatcher pairs a transcript with the caller's instruction (or the default one), sends
//! both as ordered user messages to the completion provider, and turns the reply into a
//! [`SummaryResult`]. Providers sit behind [`SummarizationClient`] so handlers can be exercised
//! with fakes.

mod result;

pub use result::{StructuredSummary, SummaryResult};

use crate::ingest::Transcript;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instruction used when the caller leaves the prompt empty.
pub const DEFAULT_INSTRUCTION: &str = "Summarize the following document.";
/// Gemini model used for every summary.
pub const MODEL: &str = "gemini-2.0-flash";
/// Sampling temperature used for every summary.
pub const TEMPERATURE: f64 = 0.2;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// The provider could not be reached.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Completion request handed to a [`SummarizationClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// User message parts, in the order they are sent.
    pub parts: Vec<String>,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Run a completion and return the generated text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Pick the caller's instruction, or the default one when it is missing or blank.
pub fn resolve_instruction(instruction: Option<&str>) -> String {
    match instruction {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => DEFAULT_INSTRUCTION.to_string(),
    }
}

/// Summarize `transcript` following `instruction`.
pub async fn summarize(
    client: &dyn SummarizationClient,
    transcript: Transcript,
    instruction: Option<&str>,
) -> Result<SummaryResult, SummarizationClientError> {
    let instruction = resolve_instruction(instruction);
    tracing::info!(
        model = MODEL,
        transcript_chars = transcript.as_str().chars().count(),
        default_instruction = instruction == DEFAULT_INSTRUCTION,
        "Dispatching summarization"
    );
    let text = client
        .complete(CompletionRequest {
            model: MODEL.to_string(),
            parts: vec![instruction, transcript.into_inner()],
            temperature: TEMPERATURE,
        })
        .await?;
    Ok(SummaryResult::from_response(text))
}

/// Gemini REST client.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client for the Gemini API rooted at `base_url`.
    pub fn new(base_url: String, api_key: String) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("askdoc/summary")
            .build()
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl SummarizationClient for GeminiClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = GenerateContentRequest {
            contents: request
                .parts
                .iter()
                .map(|text| Content {
                    role: "user",
                    parts: [TextPart {
                        text: text.as_str(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let endpoint = self.endpoint(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        body.text().ok_or_else(|| {
            SummarizationClientError::InvalidResponse("Gemini response contained no text".into())
        })
    }
}
