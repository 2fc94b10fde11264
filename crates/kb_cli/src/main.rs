mod cli;
mod output;
mod server;

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kb_core::{
    evaluate_cases, AnswerResolver, EvalCase, IntentClassifier, JsonlKnowledgeStore,
    KnowledgeRepository, NluClassifier, ResolverConfig,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, KnowledgeCommand, OutputFormat};
use crate::server::AppState;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn read_eval_cases_json(path: &Path) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let cases: Vec<EvalCase> = serde_json::from_reader(file).context("parse eval cases json")?;
    Ok(cases)
}

fn open_store(cli: &Cli, config: &ResolverConfig) -> Arc<JsonlKnowledgeStore> {
    Arc::new(JsonlKnowledgeStore::new(&cli.store).with_timeout(config.store_timeout))
}

async fn run_knowledge(
    store: &JsonlKnowledgeStore,
    action: &KnowledgeCommand,
    format: OutputFormat,
) -> Result<()> {
    match action {
        KnowledgeCommand::Add { .. } => {
            let new = action.new_knowledge().unwrap_or_default();
            let entry = store.create(new).await.context("add knowledge entry")?;
            output::print_entry(format, &entry)
        }
        KnowledgeCommand::List { active_only } => {
            let entries = if *active_only {
                store.list_active().await
            } else {
                store.list_all().await
            }
            .context("list knowledge entries")?;
            output::print_entries(format, &entries)
        }
        KnowledgeCommand::Update { id, .. } => {
            let patch = action.patch().unwrap_or_default();
            if patch.is_empty() {
                anyhow::bail!("nothing to update: pass at least one field");
            }
            let entry = store
                .update(*id, &patch)
                .await
                .with_context(|| format!("update knowledge entry {id}"))?;
            output::print_entry(format, &entry)
        }
        KnowledgeCommand::Delete { id } => {
            let entry = store
                .delete(*id)
                .await
                .with_context(|| format!("delete knowledge entry {id}"))?;
            output::print_entry(format, &entry)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;
    let config = cli.resolver_config();
    config.validate()?;

    match &cli.command {
        Commands::Ask { question } => {
            let store = open_store(&cli, &config);
            let classifier = NluClassifier::from_config(&config)?;
            let resolver = AnswerResolver::new(store, classifier).with_threshold(config.threshold);
            let outcome = resolver
                .resolve(question)
                .await
                .context("resolve question")?;
            output::print_outcome(cli.output, &outcome)?;
        }
        Commands::Knowledge { action } => {
            let store = open_store(&cli, &config);
            run_knowledge(&store, action, cli.output).await?;
        }
        Commands::Eval {
            cases,
            min_pass_rate,
        } => {
            let store = open_store(&cli, &config);
            let classifier = NluClassifier::from_config(&config)?;
            let resolver = AnswerResolver::new(store, classifier).with_threshold(config.threshold);
            let cases = read_eval_cases_json(cases)?;
            let summary = evaluate_cases(&resolver, &cases)
                .await
                .context("evaluate cases")?;
            output::print_summary(cli.output, &summary, *min_pass_rate)?;
        }
        Commands::Serve { bind } => {
            let store = open_store(&cli, &config);
            let classifier: Arc<dyn IntentClassifier> =
                Arc::new(NluClassifier::from_config(&config)?);
            tracing::info!(
                store = %cli.store.display(),
                nlu_url = %config.nlu_url,
                threshold = config.threshold,
                "starting answer service"
            );
            server::serve(*bind, AppState::new(store, classifier, config.threshold)).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Settings may come from a .env file; real environment variables win.
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(default_level);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
