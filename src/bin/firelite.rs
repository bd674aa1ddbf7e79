use clap::{Parser, Subcommand};
use firelite::{Engine, EngineConfig, MemoryStore};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "firelite", version, about = "Run Firestore StructuredQuery requests against local JSON documents", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, global = true, help = "Path to a config file (TOML). Defaults to FIRELITE_CONFIG, then ./firelite.toml.")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the project id (takes precedence over config/env)")]
    project: Option<String>,
    #[arg(long, global = true, help = "Override the database id (takes precedence over config/env)")]
    database: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run a query over a documents file and print the result as JSON")]
    Query {
        #[arg(long, help = "Documents JSON: an array of documents or an object keyed by resource name")]
        documents: PathBuf,
        #[arg(long, help = "StructuredQuery JSON, bare or wrapped in {\"structuredQuery\": ...}")]
        query: PathBuf,
        #[arg(long, help = "Parent document path for subcollection queries, e.g. users/alice")]
        parent: Option<String>,
        #[arg(long, help = "Print the runQuery response stream instead of documents + metadata")]
        stream: bool,
    },
    #[command(about = "Print the compiled form of a query without running it")]
    Explain {
        #[arg(long, help = "StructuredQuery JSON file")]
        query: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig, firelite::DbError> {
    // Precedence: CLI > env > config file > defaults
    let mut cfg = EngineConfig::load(cli.config.as_deref())?;
    if let Some(p) = &cli.project {
        cfg.project_id.clone_from(p);
    }
    if let Some(d) = &cli.database {
        cfg.database_id.clone_from(d);
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<String, Box<dyn std::error::Error>> {
    let cfg = load_config(cli)?;
    firelite::utils::logger::init_from_config(&cfg.log)?;
    let engine = Engine::new(cfg);
    match &cli.command {
        Commands::Query { documents, query, parent, stream } => {
            let store = MemoryStore::new();
            let loaded = store.load_file(documents)?;
            log::info!("loaded {loaded} document(s) from {}", documents.display());
            let request = firelite::query::parse_query_json(&std::fs::read_to_string(query)?)?;
            let mut target = engine.target();
            if let Some(p) = parent {
                target = target.with_parent(p.clone());
            }
            let result = engine.run_query_in(&request, &target, &store)?;
            let out = if *stream {
                serde_json::to_string_pretty(&result.to_run_query_response())?
            } else {
                serde_json::to_string_pretty(&result)?
            };
            Ok(out)
        }
        Commands::Explain { query } => {
            let request = firelite::query::parse_query_json(&std::fs::read_to_string(query)?)?;
            let spec = engine.compile(&request)?;
            Ok(serde_json::to_string_pretty(&spec)?)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
