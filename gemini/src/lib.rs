//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for Gemini's generateContent API with:
//! - Non-streaming completions
//! - System instructions and multi-turn content
//! - Function calling (tool use) support

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The model requests default to when they name none themselves.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a generateContent request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_request = build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/models/{model}:generateContent"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A generateContent request to send to Gemini.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub system: Option<String>,
    pub messages: Vec<Content>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub tools: Option<Vec<Tool>>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Content>) -> Self {
        Self {
            model: None,
            system: None,
            messages,
            max_tokens: None,
            temperature: None,
            tools: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// A content entry in the conversation.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user content entry with text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Create a model content entry with text.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Create a function-response content entry for a completed tool call.
    pub fn function_response(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            role: Role::Function,
            parts: vec![Part::FunctionResponse {
                name: name.into(),
                response,
            }],
        }
    }
}

/// The role of a content entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
    Function,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::Function => "function",
        }
    }
}

/// A part of a content entry.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

impl Part {
    /// Extract text from a Text part.
    pub fn as_text(&self) -> Option<&str> {
        if let Part::Text(text) = self {
            Some(text)
        } else {
            None
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// A function declaration the model may call.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A generateContent response from Gemini.
#[derive(Debug, Clone)]
pub struct Response {
    pub content: Vec<Part>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| part.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get all function calls in the response.
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.content
            .iter()
            .filter_map(|part| {
                if let Part::FunctionCall(call) = part {
                    Some(call)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other,
}

/// Token usage information.
#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

/// One wire-format part. Exactly one of the fields is populated; the
/// others serialize away, and unknown response fields are ignored.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiToolGroup {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

fn build_api_request(request: &Request) -> ApiRequest {
    let system_instruction = request.system.as_ref().map(|text| ApiContent {
        role: None,
        parts: vec![ApiPart {
            text: Some(text.clone()),
            ..Default::default()
        }],
    });

    let contents = request
        .messages
        .iter()
        .map(|content| ApiContent {
            role: Some(content.role.as_str().to_string()),
            parts: content.parts.iter().map(part_to_api).collect(),
        })
        .collect();

    let tools = request.tools.as_ref().map(|tools| {
        vec![ApiToolGroup {
            function_declarations: tools
                .iter()
                .map(|t| ApiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    });

    let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
        Some(ApiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        })
    } else {
        None
    };

    ApiRequest {
        system_instruction,
        contents,
        tools,
        generation_config,
    }
}

fn part_to_api(part: &Part) -> ApiPart {
    match part {
        Part::Text(text) => ApiPart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::FunctionCall(call) => ApiPart {
            function_call: Some(ApiFunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..Default::default()
        },
        Part::FunctionResponse { name, response } => ApiPart {
            function_response: Some(ApiFunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..Default::default()
        },
    }
}

fn parse_response(api_response: ApiResponse) -> Result<Response, Error> {
    let candidate = api_response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("response contained no candidates".to_string()))?;

    let content = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(api_part_to_part).collect())
        .unwrap_or_default();

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY") => FinishReason::Safety,
        Some("RECITATION") => FinishReason::Recitation,
        Some(_) => FinishReason::Other,
    };

    let usage = api_response
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or(Usage {
            input_tokens: 0,
            output_tokens: 0,
        });

    Ok(Response {
        content,
        finish_reason,
        usage,
    })
}

fn api_part_to_part(part: ApiPart) -> Option<Part> {
    if let Some(text) = part.text {
        Some(Part::Text(text))
    } else if let Some(call) = part.function_call {
        Some(Part::FunctionCall(FunctionCall {
            name: call.name,
            args: call.args,
        }))
    } else {
        part.function_response
            .map(|r| Part::FunctionResponse {
                name: r.name,
                response: r.response,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = Gemini::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Gemini::new("test-key").with_model("gemini-2.5-pro");
        assert_eq!(client.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Content::user("Hello")])
            .with_system("You are a helpful assistant")
            .with_max_tokens(1000)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, Some(1000));
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_content_creation() {
        let user = Content::user("Hello");
        assert!(matches!(user.role, Role::User));
        assert_eq!(user.parts.len(), 1);

        let model = Content::model("Hi there");
        assert!(matches!(model.role, Role::Model));

        let reply = Content::function_response("get_weather", json!({"temp": 20}));
        assert!(matches!(reply.role, Role::Function));
    }

    #[test]
    fn test_response_text() {
        let response = Response {
            content: vec![
                Part::Text("Hello".to_string()),
                Part::Text(" world".to_string()),
            ],
            finish_reason: FinishReason::Stop,
            usage: Usage {
                input_tokens: 1,
                output_tokens: 2,
            },
        };
        assert_eq!(response.text(), "Hello world");
        assert!(response.function_calls().is_empty());
    }

    #[test]
    fn test_response_function_calls() {
        let response = Response {
            content: vec![Part::FunctionCall(FunctionCall {
                name: "get_character".to_string(),
                args: json!({"full_name": "지후"}),
            })],
            finish_reason: FinishReason::Stop,
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        };
        let calls = response.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_character");
    }

    #[test]
    fn test_api_request_serialization() {
        let request = Request::new(vec![Content::user("hi")])
            .with_system("be brief")
            .with_temperature(0.2)
            .with_tools(vec![Tool {
                name: "list_characters".to_string(),
                description: "List names".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }]);

        let api = build_api_request(&request);
        let value = serde_json::to_value(&api).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "list_characters"
        );
        assert_eq!(value["generationConfig"]["temperature"], 0.2);
    }

    #[test]
    fn test_api_response_parsing() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Checking"},
                        {"functionCall": {"name": "get_character", "args": {"full_name": "윤아"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
        });

        let api_response: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_response(api_response).unwrap();

        assert_eq!(response.text(), "Checking");
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[test]
    fn test_empty_candidates_is_parse_error() {
        let api_response: ApiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parse_response(api_response), Err(Error::Parse(_))));
    }
}
