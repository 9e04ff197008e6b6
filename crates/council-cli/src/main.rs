//! Command-line interface for council-rs

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use council_core::{Decision, Horizon, Request, Role};
use council_engine::{
    CouncilConfig, JsonFileEmitter, PipelineRouter, Planner, Roster, SignalEmitter, Strategy,
};
use council_llm::providers::OpenAIProvider;
use council_llm::{LLMProvider, LlmPlanner, LlmProducer, ProducerSettings, PromptBook};
use council_utils::{LogFormat, init_tracing};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(version, about = "Multi-analyst trading council with bounded debate", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a symbol and print the council's decision
    Analyze(AnalyzeArgs),
    /// List configured roles and their weights
    Roles {
        /// JSON configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Ticker symbol to analyze
    symbol: String,

    /// Investment horizon (short, medium, long)
    #[arg(long, default_value = "short")]
    horizon: Horizon,

    /// Free-text market context
    #[arg(long)]
    context: Option<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Role weights, e.g. technical=2,news=1
    #[arg(long, value_name = "ROLE=W,...")]
    weights: Option<String>,

    /// Maximum debate rounds
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Producer selection strategy (fixed, planned)
    #[arg(long, default_value = "fixed")]
    strategy: Strategy,

    /// Directory for signal files
    #[arg(long, value_name = "DIR", default_value = "signals")]
    signals_dir: PathBuf,

    /// Print the full decision as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Text };
    init_tracing(format, "warn");

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Roles { config } => {
            let config = load_config(config.as_ref(), None, None)?;
            print_roles(&config);
            Ok(())
        }
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(
        args.config.as_ref(),
        args.weights.as_deref(),
        args.max_rounds,
    )?;

    let provider: Arc<dyn LLMProvider> =
        Arc::new(OpenAIProvider::from_env().context("failed to configure the LLM provider")?);
    let prompts = Arc::new(PromptBook::new()?);
    let settings = ProducerSettings::from_env();

    let roster = LlmProducer::for_roles(&config.roles, &provider, &prompts, &settings)
        .into_iter()
        .fold(Roster::new(), Roster::with);
    let planner: Arc<dyn Planner> = Arc::new(LlmPlanner::new(provider, prompts, settings));
    let router = PipelineRouter::new(config, &roster, Some(planner))?;

    let mut request = Request::new(args.symbol, args.horizon)?;
    if let Some(context) = args.context {
        request = request.with_context(context);
    }

    info!(
        "Analyzing {} ({}) with the {} strategy",
        request.subject(),
        request.horizon().as_str(),
        args.strategy
    );
    let decision = router.decide(args.strategy, &request).await;

    let emitter = JsonFileEmitter::new(&args.signals_dir);
    let location = emitter.emit(&decision).await?;

    if args.json {
        println!("{}", decision.to_json()?);
    } else {
        print_decision(&decision);
        println!("\nSignal written to {location}");
    }
    Ok(())
}

/// File (or defaults), then `COUNCIL_*` env vars, then command-line flags
fn load_config(
    path: Option<&PathBuf>,
    weights: Option<&str>,
    max_rounds: Option<u32>,
) -> Result<CouncilConfig> {
    let config = match path {
        Some(path) => CouncilConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CouncilConfig::builder().build()?,
    };
    let mut config = config.with_env_overrides()?;

    if let Some(weights) = weights {
        for (role, weight) in parse_weights(weights)? {
            config.weights.insert(role, weight);
        }
    }
    if let Some(rounds) = max_rounds {
        config.max_debate_rounds = rounds;
    }

    config.validate()?;
    Ok(config)
}

fn parse_weights(list: &str) -> Result<Vec<(Role, f64)>> {
    list.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let Some((role, weight)) = pair.split_once('=') else {
                bail!("expected role=weight, got '{pair}'");
            };
            let role: Role = role.trim().parse()?;
            let weight: f64 = weight
                .trim()
                .parse()
                .with_context(|| format!("invalid weight for {role}: '{weight}'"))?;
            Ok((role, weight))
        })
        .collect()
}

fn print_roles(config: &CouncilConfig) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Role", "Weight", "Timeout"]);
    for role in &config.roles {
        table.add_row(vec![
            role.title().to_string(),
            format!("{:.2}", config.weight(*role)),
            format!("{}s", config.call_timeout_for(*role).as_secs_f64()),
        ]);
    }
    println!("{table}");
}

fn print_decision(decision: &Decision) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Role", "Action", "Conviction", "Thesis"]);
    for (role, proposal) in decision.proposals().iter() {
        let action = if proposal.is_neutral() {
            format!("{} (neutral)", proposal.action())
        } else {
            proposal.action().to_string()
        };
        table.add_row(vec![
            role.title().to_string(),
            action,
            format!("{:.2}", proposal.conviction()),
            proposal.thesis_line().to_string(),
        ]);
    }
    println!("{table}");

    println!(
        "\nDecision for {} ({}): {} at {:.2} confidence",
        decision.subject(),
        decision.horizon().as_str(),
        decision.action(),
        decision.confidence()
    );

    println!("\nRationale:\n{}", decision.rationale());

    if !decision.evidence().is_empty() {
        println!("\nEvidence:");
        for (role, items) in decision.evidence().iter() {
            println!("  {}:", role.title());
            for item in items {
                println!("    - {item}");
            }
        }
    }

    match decision.debate() {
        Some(debate) => println!(
            "\nDebate ({} round(s), {}): {}",
            debate.rounds,
            if debate.converged { "converged" } else { "unresolved" },
            debate.summary
        ),
        None => println!("\nNo debate: analysts did not conflict"),
    }
}
