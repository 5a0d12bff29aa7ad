//! Parley application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the command dictionary (seeding defaults on first run)
//! 3. Build the resolver, with the LLM classifier when a key is configured
//! 4. Run the requested subcommand; `listen` reads utterances from stdin
//!    and drives them through the pipeline until EOF or Ctrl-C

mod cli;
mod effects;
mod pipeline;

use std::sync::Arc;

use clap::Parser;
use parley_core::config::ParleyConfig;
use parley_dictionary::{describe_action, CommandDictionary, DEFAULT_COMMANDS};
use parley_intent::{IntentClassifier, IntentResolver, LlmClassifier};
use parley_learning::{LearningLoop, MaintenanceScheduler};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::{CliArgs, Command};
use crate::effects::ConsoleEffects;
use crate::pipeline::{CommandPipeline, PipelineOutcome};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Every action the dictionary knows, with a description for the prompt.
fn advertised_actions(dictionary: &CommandDictionary) -> Vec<(String, String)> {
    let mut actions: Vec<(String, String)> = Vec::new();
    for entry in dictionary.entries() {
        if actions.iter().any(|(a, _)| *a == entry.action) {
            continue;
        }
        let description = describe_action(&entry.action)
            .map(str::to_string)
            .unwrap_or_else(|| entry.action.to_lowercase().replace('_', " "));
        actions.push((entry.action.clone(), description));
    }
    actions.sort();
    actions
}

fn build_resolver(config: &ParleyConfig, dictionary: Arc<CommandDictionary>) -> IntentResolver {
    let resolver = IntentResolver::new(dictionary.clone(), config.resolver.clone());
    if !config.resolver.ai_enabled {
        tracing::info!("External classifier disabled");
        return resolver;
    }
    match LlmClassifier::from_config(&config.llm) {
        Ok(classifier) => {
            let classifier = classifier.with_actions(&advertised_actions(&dictionary));
            tracing::info!(model = %classifier.model(), "External classifier enabled");
            let classifier: Arc<dyn IntentClassifier> = Arc::new(classifier);
            resolver.with_classifier(classifier)
        }
        Err(e) => {
            tracing::warn!(error = %e, "External classifier unavailable, dictionary only");
            resolver
        }
    }
}

async fn listen(
    config: &ParleyConfig,
    dictionary: Arc<CommandDictionary>,
    app: Option<String>,
) -> AppResult<()> {
    let effects = Arc::new(ConsoleEffects);
    let learning = LearningLoop::new(dictionary.clone(), effects.clone(), config.learning.clone());
    let resolver = build_resolver(config, dictionary.clone());
    let scheduler = Arc::new(MaintenanceScheduler::new(learning.clone()));
    let pipeline = CommandPipeline::new(resolver, learning, effects);
    let maintenance = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    tracing::info!(entries = dictionary.len(), "Listening for utterances on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                break;
            }
        };

        match pipeline.process(&line, app.as_deref()).await {
            PipelineOutcome::Dictation(text) => println!("{}", text),
            PipelineOutcome::Confirming(result) => {
                tracing::debug!(action = %result.action, "Awaiting confirmation");
            }
            PipelineOutcome::Executed(_) | PipelineOutcome::Feedback | PipelineOutcome::Ignored => {}
        }
    }

    pipeline.learning().reset();
    scheduler.shutdown();
    if let Err(e) = maintenance.await {
        tracing::warn!(error = %e, "Maintenance task did not stop cleanly");
    }
    pipeline.learning().flush()?;

    let stats = dictionary.stats();
    tracing::info!(
        tier1 = stats.tier1_hits,
        tier2 = stats.tier2_hits,
        tier3 = stats.tier3_hits,
        errors = stats.errors,
        dictations = stats.dictations,
        "Session finished"
    );
    Ok(())
}

fn list(dictionary: &CommandDictionary) {
    let mut entries = dictionary.entries();
    entries.sort_by(|a, b| a.action.cmp(&b.action));
    for entry in entries {
        let phrases: Vec<&str> = entry.phrases.iter().map(String::as_str).collect();
        println!(
            "{:<20} {:<9} {:.2} uses={:<4} {}",
            entry.action,
            entry.source.to_string(),
            entry.confidence,
            entry.use_count,
            phrases.join(", ")
        );
    }
}

/// Put back every shipped phrase the dictionary no longer has.
fn restore(dictionary: &CommandDictionary) -> AppResult<usize> {
    let restored = dictionary.restore_defaults(DEFAULT_COMMANDS);
    if restored > 0 {
        dictionary.save()?;
    }
    Ok(restored)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    let dictionary_path = config.dictionary_path();
    if let Some(dir) = dictionary_path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::error!(path = %dir.display(), error = %e, "Failed to create data directory");
            return Err(e.into());
        }
    }
    let dictionary = Arc::new(CommandDictionary::open(
        &dictionary_path,
        config.dictionary.clone(),
        DEFAULT_COMMANDS,
    ));
    tracing::info!(
        path = %dictionary_path.display(),
        entries = dictionary.len(),
        phrases = dictionary.phrase_count(),
        "Dictionary ready"
    );

    match args.command() {
        Command::Listen { app } => listen(&config, dictionary, app).await?,
        Command::List => list(&dictionary),
        Command::Forget { phrase, force } => {
            let removed = if force {
                dictionary.forget_forced(&phrase)
            } else {
                dictionary.forget(&phrase)
            };
            if removed {
                dictionary.save()?;
                println!("Forgot \"{}\"", phrase);
            } else {
                println!("\"{}\" is not a removable phrase", phrase);
            }
        }
        Command::Cleanup => {
            let learning = LearningLoop::new(
                dictionary.clone(),
                Arc::new(ConsoleEffects),
                config.learning.clone(),
            );
            let removed = learning.cleanup_unused();
            learning.flush()?;
            println!("Removed {} stale command(s)", removed);
        }
        Command::Restore => {
            let restored = restore(&dictionary)?;
            println!("Restored {} default phrase(s)", restored);
        }
    }

    Ok(())
}
