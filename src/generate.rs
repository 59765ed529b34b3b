use crate::config::{Config, ProviderChoice};
use crate::context_cache::CachedContext;
use crate::llm::openai::{ChatTransport, RemoteProvider};
use crate::llm::prompt_builder::{build_prompt, PING};
use crate::llm::{truncate, GenerateError, GenerationProvider};
use crate::normalize::normalize;
use crate::ticket::TicketReference;

/// Everything known about the pull request when the developer asks for a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    pub user_notes: String,
    pub pr_title: String,
    pub pr_description: String,
    pub ticket: Option<TicketReference>,
}

impl GenerationContext {
    /// Combine page context with the developer's notes. The ticket comes from
    /// the page when cached, else from the source branch name.
    pub fn assemble(
        user_notes: &str,
        pr_title: &str,
        cached: &CachedContext,
        source_branch: &str,
    ) -> Self {
        let ticket = cached
            .ticket
            .clone()
            .or_else(|| TicketReference::from_text(source_branch));

        GenerationContext {
            user_notes: user_notes.to_string(),
            pr_title: pr_title.to_string(),
            pr_description: cached.description.clone().unwrap_or_default(),
            ticket,
        }
    }
}

/// Runs one generation request end to end: prompt, backend, cleanup.
pub struct Orchestrator<'a, L, T> {
    config: &'a Config,
    on_device: L,
    transport: T,
}

impl<'a, L, T> Orchestrator<'a, L, T>
where
    L: GenerationProvider,
    T: ChatTransport,
{
    pub fn new(config: &'a Config, on_device: L, transport: T) -> Self {
        Orchestrator {
            config,
            on_device,
            transport,
        }
    }

    /// Generate a normalized commit message, or `Ok(None)` if the backend returned nothing.
    pub fn run(&self, ctx: &GenerationContext) -> Result<Option<String>, GenerateError> {
        let choice = self.config.provider_choice();
        log::info!("Generating with the {} provider", choice.as_str());

        let prompt = build_prompt(
            &ctx.user_notes,
            &ctx.pr_title,
            &ctx.pr_description,
            ctx.ticket.as_ref().map(TicketReference::title),
        );
        log::debug!("Generation prompt:\n{}", truncate(&prompt, 3000));

        let Some(raw) = self.dispatch(choice, &prompt)? else {
            return Ok(None);
        };

        if raw.trim().is_empty() {
            log::warn!("Provider returned an empty message");
            return Ok(None);
        }
        log::debug!("Raw model output: {raw:?}");

        let ticket = ctx.ticket.as_ref().map(TicketReference::id);
        Ok(Some(normalize(&raw, ticket)))
    }

    /// Send a trivial prompt to the configured backend and return its raw reply.
    pub fn ping(&self) -> Result<Option<String>, GenerateError> {
        self.dispatch(self.config.provider_choice(), PING)
    }

    fn dispatch(
        &self,
        choice: ProviderChoice,
        prompt: &str,
    ) -> Result<Option<String>, GenerateError> {
        match choice {
            // A blank on-device reply counts as the model not being ready.
            ProviderChoice::OnDevice => self
                .on_device
                .generate(prompt)?
                .filter(|reply| !reply.trim().is_empty())
                .ok_or(GenerateError::ProviderUnavailable)
                .map(Some),
            ProviderChoice::Remote => {
                let key = self
                    .config
                    .api_key
                    .clone()
                    .ok_or(GenerateError::MissingCredential)?;
                RemoteProvider::new(
                    &self.transport,
                    key,
                    self.config.model.clone(),
                    &self.config.api_base_url,
                )
                .generate(prompt)
            }
        }
    }
}
