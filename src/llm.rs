//! The external LLM contract, plus a concrete OpenRouter-backed implementation.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::message::Message;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate JSON matching `schema` for `prompt`.
    async fn structured_generate(&self, prompt: &str, schema: &Value) -> Result<Value, CoreError>;

    /// Stream free-form text for `messages`.
    async fn stream_text(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String, CoreError>>, CoreError>;
}

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        self.http
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://citeweave.invalid")
            .header("X-Title", "citeweave")
    }

    async fn send_with_retry(&self, body: &Value) -> Result<reqwest::Response, CoreError> {
        for attempt in 0..2 {
            let response = self
                .request()
                .json(body)
                .send()
                .await
                .map_err(|e| CoreError::network("openrouter", e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt == 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    continue;
                }
                return Err(CoreError::RateLimit {
                    source: "openrouter".into(),
                    retry_after_ms: None,
                });
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(CoreError::Auth {
                    env_var: "OPENROUTER_API_KEY".into(),
                });
            }
            return Err(CoreError::network("openrouter", format!("unexpected status {status}")));
        }
        Err(CoreError::network("openrouter", "exhausted retries"))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn structured_generate(&self, prompt: &str, schema: &Value) -> Result<Value, CoreError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": { "type": "json_schema", "json_schema": { "name": "response", "schema": schema } },
        });
        let response = self.send_with_retry(&body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::network("openrouter", e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::internal("openrouter returned no choices"))?;
        serde_json::from_str(&content).map_err(|e| CoreError::Validation {
            message: format!("model did not return valid JSON: {e}"),
        })
    }

    async fn stream_text(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String, CoreError>>, CoreError> {
        let payload: Vec<ChatRequestMessage> = messages
            .iter()
            .map(|m| ChatRequestMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();
        let body = serde_json::json!({
            "model": self.model,
            "messages": payload,
            "stream": true,
        });
        let response = self.send_with_retry(&body).await?;
        let byte_stream = response.bytes_stream();

        let stream = byte_stream.map(|chunk| {
            let bytes = chunk.map_err(|e| CoreError::network("openrouter", e.to_string()))?;
            let text = String::from_utf8_lossy(&bytes);
            Ok(parse_sse_deltas(&text))
        });

        Ok(stream
            .flat_map(|result: Result<Vec<String>, CoreError>| match result {
                Ok(deltas) => futures_util::stream::iter(deltas.into_iter().map(Ok)).boxed(),
                Err(e) => futures_util::stream::iter(vec![Err(e)]).boxed(),
            })
            .boxed())
    }
}

/// Parses an OpenAI-compatible SSE chunk (`data: {...}\n\n` lines, terminated
/// by `data: [DONE]`) into the text deltas it carries.
fn parse_sse_deltas(chunk: &str) -> Vec<String> {
    chunk
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|payload| *payload != "[DONE]")
        .filter_map(|payload| serde_json::from_str::<Value>(payload).ok())
        .filter_map(|json| {
            json.get("choices")?
                .get(0)?
                .get("delta")?
                .get("content")?
                .as_str()
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_delta_parsing_extracts_content_and_skips_done() {
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n";
        let deltas = parse_sse_deltas(chunk);
        assert_eq!(deltas, vec!["hel".to_string(), "lo".to_string()]);
    }
}
