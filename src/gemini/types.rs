//! Gemini request/response payloads.
//!
//! Only the subset of the API the relay touches is modelled; unknown response
//! fields are ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::model::Prompt;

// ─── Request ───────────────────────────────────────────────────────────────

/// Body of a `streamGenerateContent` call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

/// A single turn of content.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Text or inline media part.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Base64 inline payload used for vision requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl From<&Prompt> for GenerateContentRequest {
    fn from(prompt: &Prompt) -> Self {
        let parts = match prompt {
            Prompt::Text(text) => vec![Part::Text { text: text.clone() }],
            Prompt::Vision {
                text,
                image,
                mime_type,
            } => vec![
                Part::Text { text: text.clone() },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: STANDARD.encode(image),
                    },
                },
            ],
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        }
    }
}

// ─── Response ──────────────────────────────────────────────────────────────

/// One event payload from the streaming response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<ResponseContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Google API error envelope (`{"error": {...}}`).
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

/// Finish reasons that end a candidate normally.
const NORMAL_FINISH: &[&str] = &["STOP", "MAX_TOKENS", "FINISH_REASON_UNSPECIFIED"];

impl StreamPayload {
    /// Reduce the payload to the text it contributes, which may be empty.
    pub fn into_fragment(self) -> Result<String, RelayError> {
        if let Some(err) = self.error {
            return Err(RelayError::Api {
                status: err.code,
                message: err.message,
            });
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            // Usage-only trailer, unless the prompt itself was rejected.
            return match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => Err(RelayError::Blocked(reason)),
                None => Ok(String::new()),
            };
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();

        match candidate.finish_reason {
            Some(reason) if text.is_empty() && !NORMAL_FINISH.contains(&reason.as_str()) => {
                Err(RelayError::Stopped(reason))
            }
            _ => Ok(text),
        }
    }
}
