use anyhow::{anyhow, Result};
use musli::json;
use musli::{Decode, Encode};
use reqwest::blocking::Client;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::time::Duration;

use super::stream::read_stream_lines;
use super::{truncate, GenerateError, GenerationProvider};

/// Whether the local model can serve prompts right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No runtime reachable on this machine.
    Unavailable,
    /// Runtime is up but the model has not been pulled yet.
    Downloadable,
    Available,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Availability::Unavailable => "unavailable",
            Availability::Downloadable => "downloadable",
            Availability::Available => "available",
        })
    }
}

/// A model runtime living on the developer's machine.
pub trait LocalRuntime {
    type Session: LocalSession;

    fn availability(&self) -> Availability;
    fn open_session(&self) -> Result<Self::Session>;
}

/// A loaded model. Must be released once the caller is done with it.
pub trait LocalSession {
    fn prompt(&mut self, input: &str) -> Result<String>;
    fn release(&mut self);
}

/// Releases the wrapped session when dropped, whichever way the caller leaves.
struct SessionGuard<S: LocalSession>(S);

impl<S: LocalSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Generation backed by a local runtime. Yields `Ok(None)` rather than an error
/// when the runtime or model isn't ready.
pub struct OnDeviceProvider<R> {
    runtime: R,
}

impl<R: LocalRuntime> OnDeviceProvider<R> {
    pub fn new(runtime: R) -> Self {
        OnDeviceProvider { runtime }
    }
}

impl<R: LocalRuntime> GenerationProvider for OnDeviceProvider<R> {
    fn generate(&self, prompt: &str) -> Result<Option<String>, GenerateError> {
        let availability = self.runtime.availability();
        if availability != Availability::Available {
            log::info!("On-device model is {availability}; skipping");
            return Ok(None);
        }

        let session = self
            .runtime
            .open_session()
            .map_err(|e| GenerateError::RequestFailed(format!("{e:#}")))?;
        let mut session = SessionGuard(session);

        let reply = session
            .0
            .prompt(prompt)
            .map_err(|e| GenerateError::RequestFailed(format!("{e:#}")))?;

        Ok(Some(reply.trim().to_string()))
    }
}

#[derive(Debug, Encode)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Encode)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Decode)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Decode)]
struct ChatResponse {
    message: ChatReply,
}

/// Zero keep-alive asks Ollama to unload the model immediately.
#[derive(Debug, Encode)]
struct UnloadRequest {
    model: String,
    keep_alive: u32,
}

#[derive(Debug, Decode)]
struct TagModel {
    name: String,
}

#[derive(Debug, Decode)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Encode)]
struct PullRequest {
    model: String,
    stream: bool,
}

/// One line of `/api/pull` progress.
#[derive(Debug, Default, Decode)]
pub struct PullProgress {
    #[musli(default)]
    pub status: String,
    #[musli(default)]
    pub total: Option<u64>,
    #[musli(default)]
    pub completed: Option<u64>,
    #[musli(default)]
    pub error: Option<String>,
}

/// Ollama daemon on localhost, serving one model.
pub struct OllamaRuntime {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaRuntime {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn installed_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let text = self
            .http
            .get(&url)
            .send()
            .map_err(|e| anyhow!("Error calling Ollama at {url}: {e}"))?
            .error_for_status()
            .map_err(|e| anyhow!("Ollama HTTP error from {url}: {e}"))?
            .text()
            .map_err(|e| anyhow!("Failed to read Ollama response body: {e}"))?;

        let tags: TagsResponse =
            json::from_str(&text).map_err(|e| anyhow!("Failed to decode Ollama JSON: {e}"))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pull the model, reporting each progress line as it streams in.
    pub fn download(&self, on_progress: impl FnMut(&PullProgress)) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let body = json::to_string(&PullRequest {
            model: self.model.clone(),
            stream: true,
        })
        .map_err(|e| anyhow!("Failed to encode Ollama JSON request: {e}"))?;

        log::info!("Pulling {} from {url}", self.model);

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| anyhow!("Error calling Ollama at {url}: {e}"))?
            .error_for_status()
            .map_err(|e| anyhow!("Ollama HTTP error from {url}: {e}"))?;

        follow_pull(BufReader::new(resp), &self.model, on_progress)
    }
}

/// Feed `/api/pull` progress lines to `on_progress`, stopping at the first error line.
fn follow_pull(
    reader: impl BufRead,
    model: &str,
    mut on_progress: impl FnMut(&PullProgress),
) -> Result<()> {
    let mut failure = None;
    read_stream_lines(reader, |line| {
        let progress = parse_pull_line(line)?;
        if let Some(err) = &progress.error {
            failure = Some(err.clone());
            return Ok(ControlFlow::Break(()));
        }
        on_progress(&progress);
        Ok(ControlFlow::Continue(()))
    })?;

    match failure {
        Some(err) => Err(anyhow!("Ollama failed to pull {model}: {err}")),
        None => Ok(()),
    }
}

fn parse_pull_line(line: &str) -> Result<PullProgress> {
    json::from_str(line).map_err(|e| anyhow!("Failed to decode Ollama stream JSON: {e}"))
}

/// `llama3.2` matches an installed `llama3.2:latest`.
fn model_matches(wanted: &str, installed: &str) -> bool {
    if wanted.contains(':') {
        return wanted == installed;
    }
    installed
        .split_once(':')
        .map_or(installed == wanted, |(name, tag)| name == wanted && tag == "latest")
}

impl LocalRuntime for OllamaRuntime {
    type Session = OllamaSession;

    fn availability(&self) -> Availability {
        match self.installed_models() {
            Err(e) => {
                log::debug!("Ollama not reachable: {e:#}");
                Availability::Unavailable
            }
            Ok(models) if models.iter().any(|m| model_matches(&self.model, m)) => {
                Availability::Available
            }
            Ok(models) => {
                log::debug!("{} not among installed models {:?}", self.model, models);
                Availability::Downloadable
            }
        }
    }

    fn open_session(&self) -> Result<OllamaSession> {
        Ok(OllamaSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        })
    }
}

pub struct OllamaSession {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSession {
    fn post(&self, path: &str, body: String) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        log::trace!("Ollama request body: {}", truncate(&body, 2000));

        self.http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| anyhow!("Error calling Ollama at {url}: {e}"))?
            .error_for_status()
            .map_err(|e| anyhow!("Ollama HTTP error from {url}: {e}"))?
            .text()
            .map_err(|e| anyhow!("Failed to read Ollama response body: {e}"))
    }
}

impl LocalSession for OllamaSession {
    fn prompt(&mut self, input: &str) -> Result<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: input.to_string(),
            }],
        };
        let body = json::to_string(&req)
            .map_err(|e| anyhow!("Failed to encode Ollama JSON request: {e}"))?;

        log::info!("Prompting on-device model {:?}", self.model);
        let text = self.post("/api/chat", body)?;
        log::trace!("Ollama raw JSON response: {}", truncate(&text, 2000));

        let parsed: ChatResponse =
            json::from_str(&text).map_err(|e| anyhow!("Failed to decode Ollama JSON: {e}"))?;
        Ok(parsed.message.content)
    }

    fn release(&mut self) {
        let req = UnloadRequest {
            model: self.model.clone(),
            keep_alive: 0,
        };
        let result = json::to_string(&req)
            .map_err(|e| anyhow!("Failed to encode Ollama JSON request: {e}"))
            .and_then(|body| self.post("/api/generate", body));

        match result {
            Ok(_) => log::debug!("Released on-device session for {}", self.model),
            Err(e) => log::warn!("Failed to release on-device session: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        opened: Cell<u32>,
        released: Cell<u32>,
        prompts: RefCell<Vec<String>>,
    }

    struct FakeRuntime {
        availability: Availability,
        reply: Result<&'static str, &'static str>,
        counters: Rc<Counters>,
    }

    struct FakeSession {
        reply: Result<&'static str, &'static str>,
        counters: Rc<Counters>,
    }

    impl LocalRuntime for FakeRuntime {
        type Session = FakeSession;

        fn availability(&self) -> Availability {
            self.availability
        }

        fn open_session(&self) -> Result<FakeSession> {
            self.counters.opened.set(self.counters.opened.get() + 1);
            Ok(FakeSession {
                reply: self.reply,
                counters: Rc::clone(&self.counters),
            })
        }
    }

    impl LocalSession for FakeSession {
        fn prompt(&mut self, input: &str) -> Result<String> {
            self.counters.prompts.borrow_mut().push(input.to_string());
            self.reply.map(str::to_string).map_err(|e| anyhow!(e))
        }

        fn release(&mut self) {
            self.counters.released.set(self.counters.released.get() + 1);
        }
    }

    fn provider(
        availability: Availability,
        reply: Result<&'static str, &'static str>,
    ) -> (OnDeviceProvider<FakeRuntime>, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let runtime = FakeRuntime {
            availability,
            reply,
            counters: Rc::clone(&counters),
        };
        (OnDeviceProvider::new(runtime), counters)
    }

    #[test]
    fn not_ready_yields_none_without_opening_a_session() {
        for availability in [Availability::Unavailable, Availability::Downloadable] {
            let (p, counters) = provider(availability, Ok("feat: x"));
            assert_eq!(p.generate("prompt"), Ok(None));
            assert_eq!(counters.opened.get(), 0);
        }
    }

    #[test]
    fn success_trims_and_releases() {
        let (p, counters) = provider(Availability::Available, Ok("  feat: add x \n"));
        assert_eq!(p.generate("prompt"), Ok(Some("feat: add x".to_string())));
        assert_eq!(counters.opened.get(), 1);
        assert_eq!(counters.released.get(), 1);
        assert_eq!(counters.prompts.borrow().as_slice(), ["prompt"]);
    }

    #[test]
    fn failure_still_releases() {
        let (p, counters) = provider(Availability::Available, Err("model crashed"));
        let err = p.generate("prompt").unwrap_err();
        assert_eq!(err, GenerateError::RequestFailed("model crashed".into()));
        assert_eq!(counters.released.get(), 1);
    }

    #[test]
    fn untagged_model_matches_latest() {
        assert!(model_matches("llama3.2", "llama3.2:latest"));
        assert!(model_matches("llama3.2", "llama3.2"));
        assert!(!model_matches("llama3.2", "llama3.2:1b"));
        assert!(model_matches("llama3.2:1b", "llama3.2:1b"));
        assert!(!model_matches("llama3", "llama3.2:latest"));
    }

    #[test]
    fn pull_reports_progress_until_done() {
        let stream = concat!(
            "{\"status\":\"pulling manifest\"}\n",
            "{\"status\":\"downloading\",\"total\":200,\"completed\":50}\n",
            "\n",
            "{\"status\":\"success\"}\n",
        );
        let mut seen = Vec::new();
        follow_pull(stream.as_bytes(), "llama3.2", |p| {
            seen.push((p.status.clone(), p.total, p.completed))
        })
        .unwrap();

        assert_eq!(
            seen,
            [
                ("pulling manifest".to_string(), None, None),
                ("downloading".to_string(), Some(200), Some(50)),
                ("success".to_string(), None, None),
            ]
        );
    }

    #[test]
    fn pull_error_line_stops_the_stream() {
        let stream = concat!(
            "{\"status\":\"pulling manifest\"}\n",
            "{\"error\":\"pull model manifest: file does not exist\"}\n",
            "{\"status\":\"success\"}\n",
        );
        let mut statuses = Vec::new();
        let err = follow_pull(stream.as_bytes(), "nope", |p| statuses.push(p.status.clone()))
            .unwrap_err();

        assert_eq!(statuses, ["pulling manifest"]);
        let msg = err.to_string();
        assert!(msg.contains("failed to pull nope"), "{msg}");
        assert!(msg.contains("file does not exist"), "{msg}");
    }

    #[test]
    fn pull_rejects_garbled_lines() {
        assert!(follow_pull("not json\n".as_bytes(), "llama3.2", |_| {}).is_err());
    }

    #[test]
    fn unreachable_daemon_is_unavailable() {
        // Port 9 (discard) is essentially never serving HTTP.
        let runtime = OllamaRuntime::new("http://127.0.0.1:9/", "llama3.2");
        assert_eq!(runtime.availability(), Availability::Unavailable);
    }
}
