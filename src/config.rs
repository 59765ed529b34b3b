use crate::cli_args::Cli;
use crate::llm::openai;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";

/// Which backend writes the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderChoice {
    /// Model running on this machine
    OnDevice,
    /// OpenAI-compatible HTTP API
    Remote,
}

impl ProviderChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderChoice::OnDevice => "on-device",
            ProviderChoice::Remote => "remote",
        }
    }
}

/// Final resolved configuration for mergebot.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub provider: Option<ProviderChoice>,
    pub model: String,
    pub api_base_url: String,
    pub local_url: String,
    pub local_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            provider: None,
            model: openai::DEFAULT_MODEL.to_string(),
            api_base_url: openai::DEFAULT_API_BASE_URL.to_string(),
            local_url: DEFAULT_LOCAL_URL.to_string(),
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--provider`, `--api-key`, `--model`)
    ///   2. Env vars `MERGEBOT_PROVIDER`, `OPENAI_API_KEY`, `MERGEBOT_MODEL`
    ///   3. TOML `~/.config/mergebot.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = load_file_config()?.unwrap_or_default();
        let defaults = Config::default();

        let model = cli
            .model
            .clone()
            .or_else(|| env::var("MERGEBOT_MODEL").ok())
            .or(file_cfg.model)
            .unwrap_or(defaults.model);

        let api_key = cli
            .api_key
            .clone()
            .or(file_cfg.openai_api_key)
            .filter(|k| !k.trim().is_empty());

        Ok(Config {
            api_key,
            provider: cli.provider.or(file_cfg.provider),
            model,
            api_base_url: file_cfg.api_base_url.unwrap_or(defaults.api_base_url),
            local_url: cli
                .local_url
                .clone()
                .or(file_cfg.local_url)
                .unwrap_or(defaults.local_url),
            local_model: cli
                .local_model
                .clone()
                .or(file_cfg.local_model)
                .unwrap_or(defaults.local_model),
        })
    }

    /// The backend to use. With no explicit choice, an existing API key means
    /// the remote backend; otherwise the on-device one.
    pub fn provider_choice(&self) -> ProviderChoice {
        match (self.provider, &self.api_key) {
            (Some(choice), _) => choice,
            (None, Some(_)) => ProviderChoice::Remote,
            (None, None) => ProviderChoice::OnDevice,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    provider: Option<ProviderChoice>,
    openai_api_key: Option<String>,
    /// Remote model to use when not provided via CLI or env.
    model: Option<String>,
    api_base_url: Option<String>,
    local_url: Option<String>,
    local_model: Option<String>,
}

/// Return `~/.config/mergebot.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("mergebot.toml"))
}

fn load_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let cfg = toml::from_str::<FileConfig>(&data)
        .with_context(|| format!("failed to parse config file {:?}", path))?;
    log::debug!("Loaded config from {:?}", path);
    Ok(Some(cfg))
}
