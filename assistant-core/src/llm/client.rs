//! Chat client for OpenAI-compatible endpoints (Mistral, Groq, ...).
//!
//! Supports plain completions, SSE streaming, tool calling and JSON-object
//! output through the same `/chat/completions` route.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{
    ChatModel, ChatRequest, ChatResponse, EventStream, LlmError, Message, ToolCall, ToolSchema,
    Usage, sse,
};
use crate::truncate_body;

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

impl<'a> From<&'a ToolSchema> for WireTool<'a> {
    fn from(schema: &'a ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &schema.name,
                description: &schema.description,
                parameters: &schema.parameters,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn wire_request<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> WireRequest<'a> {
        let tools: Vec<WireTool<'a>> = request.tools.iter().map(WireTool::from).collect();
        WireRequest {
            model: &self.model,
            messages: &request.messages,
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
            response_format: request.json_output.then(|| json!({ "type": "json_object" })),
            stream,
        }
    }

    async fn post(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = self.wire_request(request, stream);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream,
            "sending chat request"
        );

        let res = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(res)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let res = self.post(request, false).await?;
        let body = res.text().await?;
        let parsed: WireResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

        let usage = parsed.usage.unwrap_or_default();
        info!(
            "LLM: {}ms, tokens: {}/{} (in/out)",
            start.elapsed().as_millis(),
            usage.prompt_tokens,
            usage.completion_tokens
        );

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Unexpected("no response choices".into()))?;

        match choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => Ok(ChatResponse::ToolCalls(calls)),
            _ => Ok(ChatResponse::Content(choice.message.content.unwrap_or_default())),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream, LlmError> {
        let res = self.post(request, true).await?;
        Ok(sse::event_stream(res))
    }
}
