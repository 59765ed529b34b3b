mod cli_args;
mod config;
mod context_cache;
mod generate;
mod git;
mod lint;
mod llm;
mod logging;
mod normalize;
mod page;
mod setup;
mod ticket;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

use cli_args::{Cli, Command, GenerateArgs, LintArgs};
use config::Config;
use context_cache::PrContextCache;
use generate::GenerationContext;
use lint::{LintResult, Severity};
use llm::ollama::{Availability, LocalRuntime};
use page::{PageSnapshot, PageSource};

/// Print a lint verdict the way the merge dialog would show it.
fn print_verdict(result: &LintResult) {
    if result.is_valid {
        println!("{} Looks good.", "✔".green().bold());
        return;
    }
    match result.severity {
        Severity::None => {}
        Severity::Warning => {
            for msg in &result.errors {
                println!("{} {msg}", "warning:".yellow().bold());
            }
        }
        Severity::Error => {
            for msg in &result.errors {
                println!("{} {msg}", "error:".red().bold());
            }
        }
    }
}

/// Message text from the argument, a file, or stdin.
fn read_message(args: &LintArgs) -> Result<String> {
    if let Some(message) = &args.message {
        return Ok(message.clone());
    }

    if let Some(path) = &args.file {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read commit message from {:?}", path))?;
        // Git leaves its instructions in the file as comment lines.
        let kept: Vec<&str> = data.lines().filter(|l| !l.starts_with('#')).collect();
        return Ok(kept.join("\n"));
    }

    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read commit message from stdin")?;
    Ok(buf)
}

/// Lint mode: exit non-zero only when the merge should be blocked.
fn run_lint(args: &LintArgs) -> Result<ExitCode> {
    let message = read_message(args)?;
    let result = lint::lint(&message, args.title.as_deref());

    log::debug!("Lint severity {}: {:?}", result.severity, result.errors);
    print_verdict(&result);

    Ok(if result.blocks_merge() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Replay the page views through the context cache, then ask the provider.
fn run_generate(cfg: &Config, args: &GenerateArgs) -> Result<ExitCode> {
    let mut cache = PrContextCache::new();
    let mut last_page: Option<PageSnapshot> = None;
    for path in &args.pages {
        let page = PageSnapshot::load(path)?;
        cache.refresh(&page);
        last_page = Some(page);
    }

    let title = args
        .title
        .clone()
        .or_else(|| last_page.as_ref().map(|p| p.title().to_string()))
        .unwrap_or_default();
    let branch = args
        .branch
        .clone()
        .or_else(|| {
            last_page
                .as_ref()
                .map(|p| p.source_branch().to_string())
                .filter(|b| !b.is_empty())
        })
        .or_else(git::current_branch)
        .unwrap_or_default();

    if let Some(key) = cache.page_key() {
        log::debug!("Context cached for {key}");
    }

    let mut ctx = GenerationContext::assemble(&args.notes, &title, cache.get(), &branch);
    if let Some(description) = &args.description {
        ctx.pr_description = description.clone();
    }

    log::info!(
        "Generate context: title={:?} branch={:?} ticket={:?} description={} chars, notes={} chars",
        ctx.pr_title,
        branch,
        ctx.ticket.as_ref().map(|t| t.id()),
        ctx.pr_description.len(),
        ctx.user_notes.len()
    );

    let orchestrator = setup::build_orchestrator(cfg);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message("Generating...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let outcome = orchestrator.run(&ctx);
    spinner.finish_and_clear();

    let Some(message) = outcome.map_err(|e| anyhow!(e))? else {
        eprintln!("The provider returned an empty message.");
        return Ok(ExitCode::FAILURE);
    };

    println!("----- Commit Message Preview -----");
    println!("{message}");
    println!("----------------------------------");
    print_verdict(&lint::lint(&message, Some(&ctx.pr_title)));

    if args.apply {
        let path = git::write_commit_editmsg(&message)?;
        println!("Wrote message to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn run_status(cfg: &Config) -> Result<ExitCode> {
    let runtime = setup::build_runtime(cfg);
    let availability = runtime.availability();

    println!("Selected provider: {}", cfg.provider_choice().as_str());
    let label = match availability {
        Availability::Available => availability.to_string().green(),
        Availability::Downloadable => availability.to_string().yellow(),
        Availability::Unavailable => availability.to_string().red(),
    };
    println!(
        "On-device model {} at {}: {label}",
        runtime.model(),
        cfg.local_url
    );
    if availability == Availability::Downloadable {
        println!("Run `mergebot pull` to download it.");
    }

    Ok(ExitCode::SUCCESS)
}

fn run_pull(cfg: &Config) -> Result<ExitCode> {
    let runtime = setup::build_runtime(cfg);
    if runtime.availability() == Availability::Available {
        println!("{} is already available.", runtime.model());
        return Ok(ExitCode::SUCCESS);
    }

    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{msg:30} [{bar:40}] {bytes}/{total_bytes}",
    )?);
    runtime.download(|progress| {
        if let (Some(total), Some(done)) = (progress.total, progress.completed) {
            bar.set_length(total);
            bar.set_position(done);
        }
        bar.set_message(progress.status.clone());
    })?;
    bar.finish_and_clear();

    println!("{} {} is ready.", "✔".green().bold(), runtime.model());
    Ok(ExitCode::SUCCESS)
}

fn run_check(cfg: &Config) -> Result<ExitCode> {
    let orchestrator = setup::build_orchestrator(cfg);
    let provider = cfg.provider_choice().as_str();

    match orchestrator.ping().map_err(|e| anyhow!(e))? {
        Some(reply) if !reply.trim().is_empty() => {
            println!("{} {provider} provider replied: {}", "✔".green().bold(), reply.trim());
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            println!("{} {provider} provider returned nothing.", "✘".red().bold());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match &cli.command {
        Command::Lint(args) => run_lint(args),
        Command::Generate(args) => run_generate(&Config::from_sources(&cli)?, args),
        Command::Status => run_status(&Config::from_sources(&cli)?),
        Command::Pull => run_pull(&Config::from_sources(&cli)?),
        Command::Check => run_check(&Config::from_sources(&cli)?),
    }
}
