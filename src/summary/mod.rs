//! Natural-language profile summaries generated by a streaming Ollama endpoint.
//!
//! The client posts one generation request per summary and consumes the newline-delimited
//! response incrementally (see [`stream`]). Either the complete text comes back or an error does;
//! partial output is never surfaced.

pub mod stream;

use crate::config::{Config, GenerationSettings};
use crate::store::Student;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

pub use stream::{GenerationChunk, aggregate, chunk_stream};

/// Errors surfaced while producing a profile summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The generation service could not be reached or the call failed before a response arrived.
    #[error("Generation service unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The call exceeded the configured client-side timeout before a response arrived.
    #[error("Generation service timed out: {0}")]
    UpstreamTimeout(String),
    /// The generation service answered with a non-success status.
    #[error("Generation service returned {status}: {body}")]
    UpstreamStatus {
        /// HTTP status returned upstream.
        status: StatusCode,
        /// Response body captured for diagnostics.
        body: String,
    },
    /// A line of the streamed response was not a valid generation chunk.
    #[error("Failed to parse generation chunk {line:?}: {source}")]
    StreamDecode {
        /// Offending line, lossily decoded.
        line: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A line grew past the accepted length without a newline.
    #[error("Generation stream line exceeds {limit} bytes")]
    LineTooLong {
        /// Maximum accepted line length in bytes.
        limit: usize,
    },
    /// The stream ended or broke before a terminal chunk was received.
    #[error("Generation stream incomplete: {0}")]
    IncompleteStream(String),
}

/// Interface implemented by summary providers.
#[async_trait]
pub trait SummaryClient: Send + Sync {
    /// Produce a summary of the given student profile.
    async fn summarize(&self, student: &Student) -> Result<String, SummaryError>;
}

/// Body of a `POST /api/generate` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Model identifier.
    pub model: String,
    /// Prompt built from the student profile.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus-sampling threshold.
    pub top_p: f32,
    /// Output length cap.
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Build the request for a student using fixed generation settings.
    pub fn for_student(student: &Student, settings: &GenerationSettings) -> Self {
        Self {
            model: settings.model.clone(),
            prompt: profile_prompt(student),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Deterministic prompt template for a profile summary.
pub fn profile_prompt(student: &Student) -> String {
    format!(
        "Summarize this student profile: Name: {}, Age: {}, Email: {}",
        student.name, student.age, student.email
    )
}

/// Summary client backed by the Ollama `/api/generate` streaming endpoint.
pub struct OllamaSummaryClient {
    http: Client,
    base_url: String,
    settings: GenerationSettings,
}

impl OllamaSummaryClient {
    /// Construct a client for `base_url` with a timeout taken from `settings`.
    pub fn new(
        base_url: impl Into<String>,
        settings: GenerationSettings,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent("student-api/summary")
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            settings,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(config.ollama_url.clone(), config.generation.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    fn classify_send_error(&self, error: reqwest::Error) -> SummaryError {
        if error.is_timeout() {
            SummaryError::UpstreamTimeout(format!(
                "no response from {} within {}s: {error}",
                self.endpoint(),
                self.settings.timeout.as_secs_f32()
            ))
        } else {
            SummaryError::UpstreamUnavailable(format!(
                "failed to reach Ollama at {}: {error}",
                self.base_url
            ))
        }
    }
}

#[async_trait]
impl SummaryClient for OllamaSummaryClient {
    async fn summarize(&self, student: &Student) -> Result<String, SummaryError> {
        let request = GenerationRequest::for_student(student, &self.settings);
        tracing::debug!(
            student_id = student.id,
            model = %request.model,
            endpoint = %self.endpoint(),
            "Requesting profile summary"
        );

        let response = self
            .http
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|error| self.classify_send_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<unreadable body: {error}>"));
            return Err(SummaryError::UpstreamStatus { status, body });
        }

        aggregate(chunk_stream(response.bytes_stream())).await
    }
}
