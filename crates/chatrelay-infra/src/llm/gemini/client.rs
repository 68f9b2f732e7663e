//! GeminiBackend -- concrete [`AiBackend`] implementation for Google Gemini.
//!
//! Gemini's REST API is stateless, so a [`GeminiSession`] keeps the system
//! instruction and the running conversation client-side and replays them
//! with every `generateContent` call.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use chatrelay_core::llm::AiBackend;
use chatrelay_core::session::AiSession;
use chatrelay_types::llm::AiError;

use super::types::{
    GeminiContent, GeminiErrorResponse, GenerateContentRequest, GenerateContentResponse,
    ROLE_MODEL, ROLE_USER,
};

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Oldest exchanges are dropped once a session replays more entries than this.
const MAX_SESSION_CONTENTS: usize = 200;

/// Google Gemini backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiBackend {
    /// Create a backend for `model` (e.g. "gemini-2.0-flash").
    pub fn new(api_key: SecretString, model: String) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AiError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
        })
    }

    /// Override the base URL (proxies, regional endpoints).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(
        &self,
        system: &GeminiContent,
        contents: &[GeminiContent],
    ) -> Result<String, AiError> {
        let body = GenerateContentRequest {
            system_instruction: system,
            contents,
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .map(|e| e.error.message)
                .unwrap_or(error_body);
            return Err(match status.as_u16() {
                401 | 403 => AiError::AuthenticationFailed,
                429 => AiError::RateLimited,
                _ => AiError::Provider {
                    message: format!("HTTP {status}: {detail}"),
                },
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AiError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        extract_text(parsed)
    }
}

// No Debug derive: keeps the client and key out of formatted output.

/// Pull the reply text out of a response, mapping blocked or empty answers
/// to errors.
fn extract_text(response: GenerateContentResponse) -> Result<String, AiError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(AiError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(AiError::EmptyResponse)?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                AiError::Blocked(candidate.finish_reason.unwrap_or_default())
            }
            _ => AiError::EmptyResponse,
        });
    }
    Ok(text)
}

/// A Gemini conversation held client-side.
pub struct GeminiSession {
    system: GeminiContent,
    contents: Mutex<Vec<GeminiContent>>,
}

impl GeminiSession {
    fn new(system_instruction: &str) -> Self {
        Self {
            system: GeminiContent::system(system_instruction),
            contents: Mutex::new(Vec::new()),
        }
    }

    /// Entries replayed with the next request.
    pub async fn len(&self) -> usize {
        self.contents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contents.lock().await.is_empty()
    }
}

// Dropping the client-side log is the whole teardown.
impl AiSession for GeminiSession {}

impl AiBackend for GeminiBackend {
    type Session = GeminiSession;

    fn name(&self) -> &str {
        "gemini"
    }

    async fn create_session(&self, system_instruction: &str) -> Result<GeminiSession, AiError> {
        tracing::debug!(
            model = %self.model,
            instruction_chars = system_instruction.chars().count(),
            "opening gemini session"
        );
        Ok(GeminiSession::new(system_instruction))
    }

    async fn send_message(&self, session: &GeminiSession, text: &str) -> Result<String, AiError> {
        // Held across the call so exchanges land in order.
        let mut contents = session.contents.lock().await;

        let mut request = contents.clone();
        request.push(GeminiContent::text(ROLE_USER, text));

        let reply = self.generate(&session.system, &request).await?;

        contents.push(GeminiContent::text(ROLE_USER, text));
        contents.push(GeminiContent::text(ROLE_MODEL, reply.clone()));
        if contents.len() > MAX_SESSION_CONTENTS {
            let excess = contents.len() - MAX_SESSION_CONTENTS;
            // Drop whole user/model pairs.
            contents.drain(..excess + excess % 2);
        }
        Ok(reply)
    }
}
