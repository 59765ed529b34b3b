use log::debug;

use crate::config::Config;
use crate::generate::Orchestrator;
use crate::llm::ollama::{OllamaRuntime, OnDeviceProvider};
use crate::llm::openai::ReqwestTransport;

pub type DefaultOrchestrator<'a> =
    Orchestrator<'a, OnDeviceProvider<OllamaRuntime>, ReqwestTransport>;

pub fn build_runtime(cfg: &Config) -> OllamaRuntime {
    debug!("Using Ollama at {} with model {}", cfg.local_url, cfg.local_model);
    OllamaRuntime::new(cfg.local_url.clone(), cfg.local_model.clone())
}

/// Wire both backends; the orchestrator picks one per request.
pub fn build_orchestrator(cfg: &Config) -> DefaultOrchestrator<'_> {
    debug!(
        "Provider {} (remote model: {})",
        cfg.provider_choice().as_str(),
        cfg.model
    );
    Orchestrator::new(
        cfg,
        OnDeviceProvider::new(build_runtime(cfg)),
        ReqwestTransport::new(),
    )
}
