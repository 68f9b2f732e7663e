//! Gemini `generateContent` wire types.
//!
//! Only the fields the relay reads or writes are modelled; unknown response
//! fields are ignored.

use serde::{Deserialize, Serialize};

/// Role of a conversation entry as Gemini names it.
pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }

    /// A role-less content block, as used for the system instruction.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub system_instruction: &'a GeminiContent,
    pub contents: &'a [GeminiContent],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
