//! Attrition Core - CLI Entry Point
//!
//! Stand-in for the web form: reads one employee as JSON, prints the
//! prediction report.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use attrition_core::constants::{APP_NAME, APP_VERSION};
use attrition_core::logic::config::EngineConfig;
use attrition_core::logic::features::{LayoutInfo, RawInput};
use attrition_core::logic::model::inference;
use attrition_core::logic::narrative::{DisabledGenerator, NarrativeGenerator};
use attrition_core::AttritionAnalyzer;

#[derive(Parser)]
#[command(name = "attrition-core")]
#[command(about = "Employee attrition risk with per-factor explanations")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict attrition risk for one employee
    Predict {
        /// JSON object of form fields, or `-` for stdin
        input: String,

        /// Pipeline artifact (or set ATTRITION_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Skip the retention narrative
        #[arg(long)]
        no_narrative: bool,

        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },
    /// Print the input schema and engine status
    Schema {
        /// Pipeline artifact (or set ATTRITION_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env();

    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    match args.command {
        Commands::Predict { input, model, no_narrative, compact } => {
            if let Some(path) = model {
                config.model_path = path;
            }

            let raw = read_form(&input)?;
            let pipeline = inference::load_pipeline(&config.model_path, config.model_sha256.as_deref())
                .with_context(|| format!("loading pipeline from {}", config.model_path.display()))?;
            let table = config.load_substitutions().context("loading substitution rules")?;

            let narrator: Box<dyn NarrativeGenerator> = if no_narrative {
                Box::new(DisabledGenerator)
            } else {
                config.narrative.generator()
            };

            let analyzer = AttritionAnalyzer::new(pipeline, table, narrator)
                .with_max_output_tokens(config.narrative.max_output_tokens);
            let report = analyzer.analyze(&raw)?;

            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", json);
        }
        Commands::Schema { model } => {
            if let Some(path) = model {
                config.model_path = path;
            }

            if let Err(e) = inference::load_pipeline(&config.model_path, config.model_sha256.as_deref()) {
                log::warn!("Pipeline not loaded: {}", e);
            }

            let output = serde_json::json!({
                "layout": LayoutInfo::current(),
                "status": inference::get_status(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Form fields from a JSON object; numbers and booleans are stringified
fn read_form(input: &str) -> Result<RawInput> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input))?
    };

    let value: Value = serde_json::from_str(&content).context("input is not valid JSON")?;
    let Value::Object(fields) = value else {
        bail!("input must be a JSON object of form fields");
    };

    let mut raw = RawInput::new();
    for (name, value) in fields {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => bail!("field `{}` must be a string or number, got {}", name, other),
        };
        raw.insert(name, text);
    }

    Ok(raw)
}
