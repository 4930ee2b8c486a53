//! Gemini API client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::{GenerateRequest, TextGenerator};
use crate::core::config::{Config, GeminiModel};
use crate::core::credentials::CredentialStore;
use crate::error::{AppError, Result};

/// Gemini API base URL
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    model: GeminiModel,
}

impl GeminiClient {
    /// Create a new Gemini client from the stored key and configured model
    pub fn new() -> Result<Self> {
        let api_key = CredentialStore::require_gemini_key()?;
        let config = Config::load()?;

        Ok(Self::with_key(api_key, config.gemini_model))
    }

    pub fn with_key(api_key: SecretString, model: GeminiModel) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    /// Generate content using the Gemini API
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE,
            self.model.api_name(),
            self.api_key.expose_secret()
        );

        let json_mode = request.schema.is_some();
        let request_body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt,
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.7,
                max_output_tokens: request.max_tokens,
                response_mime_type: json_mode.then(|| "application/json".to_string()),
                response_schema: request.schema,
            }),
        };

        tracing::debug!(model = self.model.api_name(), json_mode, "calling Gemini");

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::GeminiApi(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GeminiApi(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::GeminiApi(format!("Failed to parse response: {}", e)))?;

        let text: String = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::GeminiApi("Empty response from API".to_string()));
        }
        Ok(text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Extract JSON content from a response (handles markdown code blocks)
///
/// Both objects and arrays are recognised.
pub fn extract_json_from_markdown(response: &str) -> String {
    let trimmed = response.trim();
    let looks_like_json = |s: &str| s.starts_with('{') || s.starts_with('[');

    // Strategy 1: Extract from ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        // Look for closing ``` or take everything after ```json if no closing
        let content = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        let json = content.trim();
        if looks_like_json(json) {
            return json.to_string();
        }
    }

    // Strategy 2: Extract from plain ``` ... ``` blocks (without json tag)
    if !trimmed.contains("```json") {
        if let Some(start) = trimmed.find("```") {
            let rest = &trimmed[start + 3..];
            let content = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
            let json = content.trim();
            if looks_like_json(json) {
                return json.to_string();
            }
        }
    }

    // Strategy 3: Find the outermost raw JSON value anywhere in the response
    let object = trimmed.find('{').zip(trimmed.rfind('}'));
    let array = trimmed.find('[').zip(trimmed.rfind(']'));
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };
    if let Some((start, end)) = span {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    // Last resort: return as-is
    trimmed.to_string()
}

/// Parse a model answer into `T`, tolerating markdown fences around the JSON
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    if let Ok(parsed) = serde_json::from_str::<T>(response.trim()) {
        return Ok(parsed);
    }

    let json_str = extract_json_from_markdown(response);
    serde_json::from_str::<T>(&json_str).map_err(|e| {
        let preview: String = json_str.chars().take(120).collect();
        AppError::MalformedAiOutput(format!("{} (got: {})", e, preview))
    })
}

/// Extract a string field from potentially malformed JSON
pub fn extract_json_field(json: &str, field: &str) -> Option<String> {
    // Look for "field": "value" or "field": "value...
    let pattern = format!(r#""{}"\s*:\s*""#, regex::escape(field));
    let re = regex::Regex::new(&pattern).ok()?;

    let m = re.find(json)?;
    let rest = &json[m.end()..];

    // Find the end of the string value (handling escaped quotes)
    let mut value = String::new();
    let mut escaped = false;

    for c in rest.chars() {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
            value.push(c);
        } else if c == '"' {
            break;
        } else {
            value.push(c);
        }
    }

    // Unescape the value
    let unescaped = value
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\");

    Some(unescaped)
}

/// Extract a boolean field from potentially malformed JSON
pub fn extract_json_bool(json: &str, field: &str) -> Option<bool> {
    let pattern = format!(r#""{}"\s*:\s*(true|false)"#, regex::escape(field));
    let re = regex::Regex::new(&pattern).ok()?;
    re.captures(json)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str() == "true")
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini API Request/Response types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    /// Missing when the candidate was blocked
    #[serde(default)]
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    #[test]
    fn test_extract_from_json_fence() {
        let response = "Here you go:\n```json\n{\"ok\": true}\n```\nDone.";
        assert_eq!(extract_json_from_markdown(response), "{\"ok\": true}");
    }

    #[test]
    fn test_extract_array_from_plain_fence() {
        let response = "```\n[{\"ok\": true}]\n```";
        assert_eq!(extract_json_from_markdown(response), "[{\"ok\": true}]");
    }

    #[test]
    fn test_extract_raw_array_with_objects_inside() {
        let response = "Result: [{\"ok\": true}, {\"ok\": false}] end";
        assert_eq!(
            extract_json_from_markdown(response),
            "[{\"ok\": true}, {\"ok\": false}]"
        );
    }

    #[test]
    fn test_extract_unclosed_fence() {
        let response = "```json\n{\"ok\": false}";
        assert_eq!(extract_json_from_markdown(response), "{\"ok\": false}");
    }

    #[test]
    fn test_parse_json_direct_and_fenced() {
        assert_eq!(
            parse_json::<Verdict>("{\"ok\": true}").unwrap(),
            Verdict { ok: true }
        );
        assert_eq!(
            parse_json::<Verdict>("```json\n{\"ok\": false}\n```").unwrap(),
            Verdict { ok: false }
        );
    }

    #[test]
    fn test_parse_json_malformed() {
        let err = parse_json::<Verdict>("I cannot help with that").unwrap_err();
        assert!(matches!(err, AppError::MalformedAiOutput(_)));
    }

    #[test]
    fn test_extract_json_field_with_escapes() {
        let json = r#"{"feedback": "Use \"went\" here\nbecause", "isCorrect": false"#;
        assert_eq!(
            extract_json_field(json, "feedback").unwrap(),
            "Use \"went\" here\nbecause"
        );
        assert_eq!(extract_json_bool(json, "isCorrect"), Some(false));
        assert_eq!(extract_json_field(json, "missing"), None);
    }

    #[test]
    fn test_request_serialization() {
        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "hi".into(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 100,
                response_mime_type: Some("application/json".into()),
                response_schema: Some(json!({"type": "OBJECT"})),
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_blocked_candidate_has_no_content() {
        let response: GeminiResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert!(response.candidates[0].content.is_none());
    }
}
