//! Abracadabra command-line front end.
//!
//! Provides the `abracadabra` binary:
//! - `summary` prints the catalog text the collaborator is shown.
//! - `validate` checks a prompt-graph file against the catalog.
//! - `synthesize` turns an instruction into a validated graph.
//!
//! Collaborator settings come from `ABRACADABRA_*` environment variables
//! (see `abracadabra_synth::config`). Logs go to stderr, filtered by
//! `RUST_LOG`; results are printed to stdout as JSON.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use abracadabra_check::validate_graph;
use abracadabra_core::catalog::{CatalogConfig, NodeCatalog};
use abracadabra_core::graph::{Graph, InputValue, Literal, SocketRef};
use abracadabra_core::node_summaries;
use abracadabra_synth::{
    builtin_examples, load_examples, LlmConfig, OpenAiCompatibleClient, SynthConfig,
    SynthError, SynthesisRequest, Synthesizer,
};

/// Instruction-driven node graph synthesis.
#[derive(Parser)]
#[command(name = "abracadabra", about = "Instruction-driven node graph synthesis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where node type definitions come from.
#[derive(Args)]
struct CatalogArgs {
    /// Catalog JSON file (default: the built-in catalog).
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Expose every registered node type instead of the allowlist.
    #[arg(long)]
    all_nodes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the summary of available node types.
    Summary {
        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Validate a prompt-graph JSON file.
    Validate {
        /// Graph to check.
        #[arg(short, long)]
        graph: PathBuf,

        /// Pre-existing graph the checked graph may link into.
        #[arg(short, long)]
        existing: Option<PathBuf>,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Generate a graph from a natural-language instruction.
    Synthesize {
        /// What the graph should do.
        #[arg(short, long)]
        instruction: String,

        /// Seed for RAND() in the generated program.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Number of outputs the graph must declare.
        #[arg(short, long, default_value_t = 1)]
        outputs: usize,

        /// Input binding NAME=VALUE. `@ID:INDEX` links to an output of the
        /// existing graph; otherwise the value is a literal.
        #[arg(long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Pre-existing graph that input links point into.
        #[arg(short, long)]
        existing: Option<PathBuf>,

        /// Directory of few-shot example programs (default: built-in set).
        #[arg(long)]
        examples: Option<PathBuf>,

        /// Prefix for generated node ids.
        #[arg(long, default_value = "abracadabra.")]
        prefix: String,

        #[command(flatten)]
        catalog: CatalogArgs,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Summary { catalog } => run_summary(&catalog),
        Commands::Validate {
            graph,
            existing,
            catalog,
        } => run_validate(&graph, existing.as_deref(), &catalog),
        Commands::Synthesize {
            instruction,
            seed,
            outputs,
            inputs,
            existing,
            examples,
            prefix,
            catalog,
        } => {
            let options = SynthesizeOptions {
                instruction,
                seed,
                outputs,
                inputs,
                existing,
                examples,
                prefix,
            };
            run_synthesize(options, &catalog).await
        }
    };
    process::exit(exit_code);
}

/// Execute the summary subcommand.
///
/// Returns exit code: 0 = success, 3 = catalog could not be loaded.
fn run_summary(args: &CatalogArgs) -> i32 {
    let catalog = match load_catalog(args) {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };
    print!("{}", node_summaries(&catalog));
    0
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 = valid, 2 = validation findings, 3 = I/O error.
fn run_validate(graph_path: &Path, existing: Option<&Path>, args: &CatalogArgs) -> i32 {
    let catalog = match load_catalog(args) {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };
    let graph = match load_graph(graph_path) {
        Ok(graph) => graph,
        Err(code) => return code,
    };
    let outer = match existing.map(load_graph).transpose() {
        Ok(outer) => outer.unwrap_or_default(),
        Err(code) => return code,
    };

    let errors = validate_graph(&graph, &catalog, &outer);
    let report = json!({
        "valid": errors.is_empty(),
        "errors": errors,
        "messages": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    print_json(&report);

    if errors.is_empty() {
        0
    } else {
        eprintln!("Validation failed with {} error(s)", errors.len());
        2
    }
}

struct SynthesizeOptions {
    instruction: String,
    seed: u64,
    outputs: usize,
    inputs: Vec<String>,
    existing: Option<PathBuf>,
    examples: Option<PathBuf>,
    prefix: String,
}

/// Execute the synthesize subcommand.
///
/// Returns exit code: 0 = success, 2 = attempt budget exhausted,
/// 3 = configuration or I/O error.
async fn run_synthesize(options: SynthesizeOptions, args: &CatalogArgs) -> i32 {
    let catalog = match load_catalog(args) {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };
    let outer = match options.existing.as_deref().map(load_graph).transpose() {
        Ok(outer) => outer.unwrap_or_default(),
        Err(code) => return code,
    };

    let mut inputs = IndexMap::new();
    for raw in &options.inputs {
        match parse_input(raw) {
            Ok((name, value)) => {
                inputs.insert(name, value);
            }
            Err(msg) => {
                eprintln!("Error: {}", msg);
                return 3;
            }
        }
    }

    let synthesizer = match build_synthesizer(options.examples.as_deref()) {
        Ok(synthesizer) => synthesizer,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 3;
        }
    };

    let request = SynthesisRequest {
        instruction: options.instruction,
        seed: options.seed,
        inputs,
        output_count: options.outputs,
        node_prefix: options.prefix,
    };

    match synthesizer.synthesize(&request, &catalog, &outer).await {
        Ok(done) => {
            tracing::info!(attempts = done.attempts, "graph ready");
            print_json(&json!({ "outputs": done.outputs, "graph": done.graph }));
            0
        }
        Err(SynthError::Exhausted {
            attempts,
            last_candidate,
            last_errors,
        }) => {
            print_json(&json!({
                "error": "exhausted",
                "attempts": attempts,
                "last_candidate": last_candidate,
                "last_errors": last_errors,
            }));
            eprintln!("Failed to generate a valid graph after {} attempt(s)", attempts);
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            3
        }
    }
}

fn build_synthesizer(
    examples_dir: Option<&Path>,
) -> Result<Synthesizer<OpenAiCompatibleClient>, SynthError> {
    let llm = LlmConfig::from_env()?;
    if !llm.is_configured() {
        return Err(SynthError::Config(
            "no API key: set ABRACADABRA_API_KEY or OPENAI_API_KEY".to_string(),
        ));
    }
    let config = SynthConfig::from_env()?;
    let examples = match examples_dir {
        Some(dir) => load_examples(dir)?,
        None => builtin_examples(),
    };
    tracing::info!(
        provider = %llm.provider,
        model = %llm.model,
        examples = examples.len(),
        "collaborator configured"
    );

    let client = OpenAiCompatibleClient::new(&llm)?;
    Ok(Synthesizer::with_config(client, &config).with_examples(examples))
}

fn load_catalog(args: &CatalogArgs) -> Result<NodeCatalog, i32> {
    let config = if args.all_nodes {
        CatalogConfig::all_nodes()
    } else {
        CatalogConfig::default()
    };
    let loaded = match &args.catalog {
        Some(path) => NodeCatalog::from_path(path, &config),
        None => NodeCatalog::builtin(&config),
    };
    loaded.map_err(|e| {
        eprintln!("Error: {}", e);
        3
    })
}

fn load_graph(path: &Path) -> Result<Graph, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    Graph::from_prompt_str(&text).map_err(|e| {
        eprintln!("Error: '{}': {}", path.display(), e);
        3
    })
}

fn print_json(value: &serde_json::Value) {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", text);
}

/// Parse a `NAME=VALUE` input binding.
///
/// `@ID:INDEX` is a link; otherwise booleans, integers and floats are
/// recognized and anything else is a string.
fn parse_input(raw: &str) -> Result<(String, InputValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid input '{}', expected NAME=VALUE", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid input '{}': empty name", raw));
    }

    let value = if let Some(link) = value.strip_prefix('@') {
        let (node, index) = link
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid link '{}', expected @ID:INDEX", value))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| format!("invalid output index in '{}'", value))?;
        InputValue::Link(SocketRef::new(node, index))
    } else {
        InputValue::Literal(parse_literal(value))
    };
    Ok((name.to_string(), value))
}

fn parse_literal(value: &str) -> Literal {
    match value {
        "true" => return Literal::from(true),
        "false" => return Literal::from(false),
        _ => {}
    }
    if let Ok(v) = value.parse::<i64>() {
        return Literal::from(v);
    }
    if let Ok(v) = value.parse::<u64>() {
        return Literal::from(v);
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Literal::float)
        .unwrap_or_else(|| Literal::from(value))
}
