use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use queryweave::{
    config::{OutputFormat, TranslatorConfig},
    hql_generator::MethodRegistry,
    query_engine::{self, DataSet},
    query_planner::QueryModel,
    translation,
};

/// queryweave - rewrite typed object queries and lower them to HQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding the query model
    #[arg(long)]
    model: PathBuf,

    /// JSON data set to evaluate the translated query against
    #[arg(long)]
    data: Option<PathBuf>,

    /// YAML configuration file (defaults to QUERYWEAVE_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Maximum subquery nesting depth
    #[arg(long)]
    max_subquery_depth: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TranslatorConfig::from_yaml_file(path),
        None => TranslatorConfig::from_env(),
    }
    .context("Configuration error")?
    .with_overrides(cli.max_subquery_depth, cli.format)
    .context("Configuration error")?;

    // Defaults to the configured filter, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    log::info!("queryweave v{}", env!("CARGO_PKG_VERSION"));

    let model_json = std::fs::read_to_string(&cli.model)
        .with_context(|| format!("Failed to read model file {}", cli.model.display()))?;
    let model: QueryModel = serde_json::from_str(&model_json)
        .with_context(|| format!("Invalid query model in {}", cli.model.display()))?;

    let registry = MethodRegistry::with_defaults();
    let translated = translation::translate(&model, &registry, &config)
        .with_context(|| format!("Failed to translate {}", model))?;

    match config.output_format {
        OutputFormat::Hql => println!("{}", translated.hql_text()),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "model": translated.model,
                "hql": translated.hql,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if let Some(path) = &cli.data {
        let data = DataSet::from_json_file(path)
            .with_context(|| format!("Failed to load data set {}", path.display()))?;
        let result = query_engine::execute(&translated.hql, &data)?;
        println!("{}", result);
    }

    Ok(())
}
