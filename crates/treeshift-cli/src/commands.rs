//! Subcommand implementations

use crate::prompt::TerminalPrompt;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use treeshift_core::{
    Classifier, Config, DecisionMap, MigrationConfig, Migrator, Sampler, SamplerConfig, Summary,
};
use treeshift_store::{JsonSource, MemoryStore, RecordingStore};

/// Load the optional config file and validate it
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => Config::default(),
    };
    Ok(config)
}

async fn load_source(input: &Path) -> Result<JsonSource> {
    JsonSource::load(input)
        .await
        .with_context(|| format!("reading source {}", input.display()))
}

async fn sample(source: &JsonSource, config: SamplerConfig) -> Result<Summary> {
    println!("Analyzing data structure...");
    let summary = Sampler::new(config).sample(source).await?;
    println!("Data structure: {}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

fn classify_interactively(summary: &Summary) -> Result<DecisionMap> {
    let decisions = Classifier::new()
        .classify(summary, &mut TerminalPrompt::new())
        .context("classification cancelled")?;
    println!("User choices: {}", decisions.to_json_pretty()?);
    Ok(decisions)
}

/// Read a decision map, YAML for `.yaml`/`.yml`, JSON otherwise
async fn load_decisions(path: &Path) -> Result<DecisionMap> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading decisions {}", path.display()))?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let decisions = if yaml {
        DecisionMap::from_yaml(&text)
    } else {
        DecisionMap::from_json(&text)
    };
    decisions.with_context(|| format!("parsing decisions {}", path.display()))
}

/// `treeshift structure`
pub(crate) async fn structure(input: &Path, sampler: SamplerConfig) -> Result<()> {
    let source = load_source(input).await?;
    sample(&source, sampler).await?;
    Ok(())
}

/// `treeshift classify`
pub(crate) async fn classify(input: &Path, out: &Path, sampler: SamplerConfig) -> Result<()> {
    let source = load_source(input).await?;
    let summary = sample(&source, sampler).await?;
    let decisions = classify_interactively(&summary)?;
    tokio::fs::write(out, decisions.to_json_pretty()?)
        .await
        .with_context(|| format!("writing decisions {}", out.display()))?;
    tracing::info!(file = %out.display(), paths = decisions.len(), "decisions saved");
    Ok(())
}

/// Options of `treeshift migrate`
#[derive(Debug)]
pub(crate) struct MigrateArgs {
    pub(crate) input: PathBuf,
    pub(crate) decisions: Option<PathBuf>,
    pub(crate) target: PathBuf,
    pub(crate) dry_run: bool,
    pub(crate) sampler: SamplerConfig,
    pub(crate) migration: MigrationConfig,
}

/// `treeshift migrate`
///
/// Target state is saved even when the run fails or is interrupted, so the
/// writes that did complete are not lost.
pub(crate) async fn migrate(args: MigrateArgs) -> Result<()> {
    let source = load_source(&args.input).await?;
    let decisions = match &args.decisions {
        Some(path) => {
            let decisions = load_decisions(path).await?;
            let summary = Sampler::new(args.sampler).sample_node(source.root());
            for unknown in decisions.unknown_paths(&summary) {
                tracing::warn!(path = unknown, "decision does not match any sampled path");
            }
            decisions
        }
        None => {
            let summary = sample(&source, args.sampler).await?;
            classify_interactively(&summary)?
        }
    };
    let migrator = Migrator::new(args.migration);

    if args.dry_run {
        let recorder = RecordingStore::new();
        let report = migrator.run(&source, &recorder, &decisions).await?;
        for op in recorder.ops() {
            println!("{}", op.describe());
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let store = MemoryStore::load_or_default(&args.target)
        .await
        .with_context(|| format!("loading target {}", args.target.display()))?;

    println!("Starting migration...");
    let outcome = tokio::select! {
        result = migrator.run(&source, &store, &decisions) => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow!("migration interrupted")),
    };

    store
        .save(&args.target)
        .await
        .with_context(|| format!("saving target {}", args.target.display()))?;

    let report = outcome.context("completed writes were kept in the target")?;
    println!("Migration completed successfully!");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
