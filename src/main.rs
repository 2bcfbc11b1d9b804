use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use homedir::my_home;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod eid;
mod vault;

use cli::{CorpusArgs, Command};
use config::Config;
use vault::{Embedder, IndexCell, Metadata, MetadataValue, VaultService};

/// Parse `key=value` filters. Values are JSON when they parse as JSON.
pub fn parse_filters(raw: &[String]) -> anyhow::Result<Metadata> {
    let mut filters = Metadata::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("filter '{entry}' must look like key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("filter '{entry}' has an empty key");
        }
        filters.insert(key.to_string(), MetadataValue::parse_loose(value.trim()));
    }
    Ok(filters)
}

fn get_base_path(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("MEDVAULT_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/medvault"))
}

/// Build the embedder from config. A provider that cannot be built is
/// logged and skipped; the hashing embedder always works.
fn build_embedder(config: &Config) -> Arc<Embedder> {
    let embedder = Embedder::hashing(config.embedding.dimensions);

    let Some(provider_config) = &config.embedding.provider else {
        return Arc::new(embedder);
    };

    match vault::providers::build_provider(provider_config, config.base_path()) {
        Ok(provider) => {
            log::info!("using embedding provider {}", provider.name());
            Arc::new(embedder.with_provider(provider))
        }
        Err(e) => {
            log::warn!("provider unavailable, using hashing embedder: {e}");
            Arc::new(embedder)
        }
    }
}

/// Index the requested corpus into a fresh service.
fn load_corpus(
    index: &IndexCell,
    config: &Config,
    corpus: &CorpusArgs,
) -> anyhow::Result<VaultService> {
    let store = index.get_index(build_embedder(config));
    let service = VaultService::new(store).with_chunk_len(config.chunking.max_len);

    if !corpus.no_seed {
        let report = vault::seed::seed(&service);
        log::info!("seeded {} docs ({} chunks)", report.docs, report.chunks);
    }

    for path in &corpus.docs {
        let documents = vault::seed::load_documents(path)?;
        let report = vault::seed::index_documents(&service, &documents);
        log::info!(
            "indexed {} docs ({} chunks) from {}",
            report.docs,
            report.chunks,
            path.display()
        );
    }

    if service.store().is_empty() {
        bail!("nothing to search: pass --docs or drop --no-seed");
    }

    Ok(service)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = get_base_path(args.base_path)?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load {}", base_path.display()))?;

    // the composition root owns the store
    let index = IndexCell::new();

    match args.command {
        Command::Embed { text } => {
            let embedder = build_embedder(&config);
            let vector = embedder.embed(&text);
            println!("{}", serde_json::to_string(&vector)?);
            Ok(())
        }

        Command::Chunk { file, max_len } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let chunks = vault::chunker::chunk(&text, max_len.unwrap_or(config.chunking.max_len));
            println!("{}", serde_json::to_string_pretty(&chunks)?);
            Ok(())
        }

        Command::Search {
            query,
            filters,
            corpus,
        } => {
            let filters = parse_filters(&filters)?;
            let service = load_corpus(&index, &config, &corpus)?;
            let top_k = corpus.top_k.unwrap_or(config.search.default_top_k);

            let hits = service.search(&query, top_k, Some(&filters))?;
            let output = json!({ "results": hits });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }

        Command::Ask { question, corpus } => {
            let service = load_corpus(&index, &config, &corpus)?;
            let top_k = corpus.top_k.unwrap_or(config.search.default_top_k);

            let hits = service.search(&question, top_k, None)?;
            let prompt = vault::context::grounded_prompt(&question, &hits);
            let output = json!({ "prompt": prompt, "hits": hits });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }

        Command::List { corpus } => {
            let service = load_corpus(&index, &config, &corpus)?;
            let store = service.store();

            let items: Vec<_> = store
                .ids()
                .iter()
                .filter_map(|id| store.get(id))
                .map(|item| {
                    json!({
                        "id": item.id,
                        "metadata": item.metadata,
                        "contents": item.contents,
                    })
                })
                .collect();

            let output = json!({
                "size": store.len(),
                "dimensions": store.dimensions(),
                "items": items,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
