use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{truncate, GenerateError, GenerationProvider};

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 100;

/// Minimal request/response structs for the Chat Completions API.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Raw HTTP outcome, before any interpretation.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one chat request. Kept apart from [`RemoteProvider`] so the wire
/// handling can run without a network.
pub trait ChatTransport {
    fn post(&self, url: &str, api_key: &str, req: &ChatRequest) -> Result<HttpReply>;
}

impl<T: ChatTransport + ?Sized> ChatTransport for &T {
    fn post(&self, url: &str, api_key: &str, req: &ChatRequest) -> Result<HttpReply> {
        (**self).post(url, api_key, req)
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .expect("failed to build HTTP client");
        ReqwestTransport { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTransport for ReqwestTransport {
    fn post(&self, url: &str, api_key: &str, req: &ChatRequest) -> Result<HttpReply> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(req)
            .send()
            .context("failed to send request to OpenAI")?;

        let status = resp.status().as_u16();
        let body = resp.text().context("failed to read OpenAI response")?;
        Ok(HttpReply { status, body })
    }
}

/// Chat-completions backend authenticated with a bearer API key.
pub struct RemoteProvider<'t, T: ChatTransport> {
    transport: &'t T,
    api_key: String,
    model: String,
    api_base_url: String,
}

impl<'t, T: ChatTransport> RemoteProvider<'t, T> {
    pub fn new(transport: &'t T, api_key: String, model: String, api_base_url: &str) -> Self {
        RemoteProvider {
            transport,
            api_key,
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }
}

impl<T: ChatTransport> GenerationProvider for RemoteProvider<'_, T> {
    fn generate(&self, prompt: &str) -> Result<Option<String>, GenerateError> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        log::info!("Calling OpenAI model {:?}", &req.model);

        let reply = self
            .transport
            .post(&self.chat_url(), &self.api_key, &req)
            .map_err(|e| GenerateError::RequestFailed(format!("{e:#}")))?;

        log::trace!("OpenAI raw response: {}", truncate(&reply.body, 2000));

        if !(200..300).contains(&reply.status) {
            return Err(GenerateError::RequestFailed(error_message(&reply)));
        }

        let chat_resp: ChatResponse = serde_json::from_str(&reply.body).map_err(|e| {
            GenerateError::RequestFailed(format!("failed to parse OpenAI response: {e}"))
        })?;

        if let Some(usage) = &chat_resp.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        Ok(chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }
}

/// Server-reported message when there is one, else a generic status line.
fn error_message(reply: &HttpReply) -> String {
    serde_json::from_str::<ErrorResponse>(&reply.body)
        .ok()
        .and_then(|r| r.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("OpenAI API error: {}", reply.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;

    struct FakeTransport {
        reply: RefCell<Option<Result<HttpReply>>>,
        calls: RefCell<Vec<(String, String, serde_json::Value)>>,
    }

    impl FakeTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self::with(Ok(HttpReply {
                status,
                body: body.to_string(),
            }))
        }

        fn with(reply: Result<HttpReply>) -> Self {
            FakeTransport {
                reply: RefCell::new(Some(reply)),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatTransport for FakeTransport {
        fn post(&self, url: &str, api_key: &str, req: &ChatRequest) -> Result<HttpReply> {
            let body = serde_json::to_value(req).unwrap();
            self.calls
                .borrow_mut()
                .push((url.to_string(), api_key.to_string(), body));
            self.reply.borrow_mut().take().expect("one call only")
        }
    }

    fn provider(t: &FakeTransport) -> RemoteProvider<'_, FakeTransport> {
        RemoteProvider::new(t, "sk-test".into(), DEFAULT_MODEL.into(), DEFAULT_API_BASE_URL)
    }

    #[test]
    fn sends_single_chat_request() {
        let t = FakeTransport::replying(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"  feat: add x\n"}}]}"#,
        );
        assert_eq!(provider(&t).generate("the prompt"), Ok(Some("feat: add x".into())));

        let calls = t.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (url, key, body) = &calls[0];
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(key, "sk-test");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "the prompt");
        assert_eq!(body["max_tokens"], 100);
        assert!(body["temperature"].is_number());
    }

    #[test]
    fn base_url_with_version_is_not_doubled() {
        let t = FakeTransport::replying(200, r#"{"choices":[]}"#);
        let p = RemoteProvider::new(&t, "k".into(), "m".into(), "http://localhost:8080/v1/");
        assert_eq!(p.generate("x"), Ok(None));
        assert_eq!(t.calls.borrow()[0].0, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn missing_content_is_none() {
        let t = FakeTransport::replying(200, r#"{"choices":[{"message":{"content":null}}]}"#);
        assert_eq!(provider(&t).generate("x"), Ok(None));
    }

    #[test]
    fn error_status_carries_server_message() {
        let t = FakeTransport::replying(
            401,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        assert_eq!(
            provider(&t).generate("x"),
            Err(GenerateError::RequestFailed("Incorrect API key provided".into()))
        );
    }

    #[test]
    fn error_status_without_message_uses_status_code() {
        let t = FakeTransport::replying(502, "<html>Bad Gateway</html>");
        assert_eq!(
            provider(&t).generate("x"),
            Err(GenerateError::RequestFailed("OpenAI API error: 502".into()))
        );
    }

    #[test]
    fn transport_failure_is_request_failed() {
        let t = FakeTransport::with(Err(anyhow!("connection reset")));
        match provider(&t).generate("x") {
            Err(GenerateError::RequestFailed(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
