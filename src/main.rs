// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! asmf: AI search/match framework CLI

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use asmf::analyzers::{Analyzer, ClaimAnalyzer};
use asmf::config::BlockKind;
use asmf::context::AppContext;
use asmf::parsers::patent;
use asmf::providers::{AiProvider, PromptContext};
use asmf::review::{OllamaReviewer, ReviewPipeline};
use asmf::scoring::{batch_evaluate, passing};
use asmf::search::SearchOptions;
use asmf::selector::TaskType;
use asmf::tracker::Status;
use asmf::{setup, AsmfError, Result};

/// asmf CLI - AI search/match framework
#[derive(Parser, Debug)]
#[command(name = "asmf")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Provider fallback, model selection, result aggregation and tracking", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recommend a local model for a task and the detected hardware
    Select {
        /// code_review, code_generation, document_analysis or general
        #[arg(short, long, default_value = "general")]
        task: String,

        /// Use this VRAM size (GB) instead of probing the GPU
        #[arg(long)]
        vram: Option<f64>,

        /// Prefer models already installed in Ollama
        #[arg(long)]
        check: bool,

        /// Print the full recommendation table
        #[arg(long)]
        recommendations: bool,
    },

    /// Send a prompt to the first available AI provider
    Ask {
        prompt: String,

        /// Context entries as key=value
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Try the local provider first
        #[arg(long)]
        local: bool,
    },

    /// Score items from a JSON array file against criteria
    Score {
        input: PathBuf,

        #[arg(long)]
        criteria: Option<String>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Minimum score to keep (defaults to evaluation.score_threshold)
        #[arg(long)]
        threshold: Option<f64>,

        /// Show every item, not just those above the threshold
        #[arg(long)]
        all: bool,
    },

    /// Search every enabled source and aggregate the results
    Search {
        query: String,

        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Keep duplicate results
        #[arg(long)]
        no_dedup: bool,

        /// Sort field; prefix with '-' for ascending
        #[arg(long, allow_hyphen_values = true)]
        sort_by: Option<String>,

        /// Add every result to the tracker
        #[arg(long)]
        track: bool,
    },

    /// Tracked item operations
    Track {
        #[command(subcommand)]
        action: TrackCommands,
    },

    /// Check technical claims against the domain configuration
    Validate {
        text: String,

        /// Also check a pressure value in bar
        #[arg(long)]
        pressure: Option<f64>,
    },

    /// Extract title, abstract and claims from a patent PDF
    ParsePatent {
        path: PathBuf,

        /// Run each claim through the domain checks and an AI assessment
        #[arg(long)]
        analyze: bool,
    },

    /// Review a GitHub pull request with Ollama
    Review {
        /// Repository full name (owner/repo)
        #[arg(long)]
        repo: String,

        #[arg(long)]
        pr: u64,

        /// Post the review as a PR comment
        #[arg(long)]
        post: bool,
    },

    /// Check the local Ollama install, pick a model and write .env
    Setup {
        #[arg(short, long, default_value = "general")]
        task: String,

        #[arg(long)]
        vram: Option<f64>,

        /// Model to configure instead of the recommendation
        #[arg(short, long)]
        model: Option<String>,

        /// Pull the model if it is not installed
        #[arg(long)]
        pull: bool,

        #[arg(long, default_value = ".env")]
        env_file: PathBuf,

        /// Do not write the env file
        #[arg(long)]
        no_env: bool,

        #[arg(long)]
        skip_verify: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show provider, model and tracker status
    Status,
}

#[derive(Subcommand, Debug)]
enum TrackCommands {
    /// Track a new item
    Add {
        title: String,

        #[arg(long, default_value = "")]
        link: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "new")]
        status: String,
    },

    /// List tracked items
    List {
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Change an item's status
    Update {
        id: String,
        status: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a tracked item
    Delete { id: String },

    /// Remove every tracked item
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Count items per status
    Stats,

    /// Export tracked items to CSV
    Export {
        output: PathBuf,

        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration (API keys redacted)
    Show,

    /// Generate default configuration file
    Generate {
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Read a value by dot-notation key
    Get { key: String },

    /// Set a value by dot-notation key; JSON values are parsed
    Set { key: String, value: String },

    /// Add a blocklist rule
    Block {
        kind: BlockArg,
        value: String,

        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Remove a blocklist rule
    Unblock { kind: BlockArg, value: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BlockArg {
    Site,
    Employer,
    Keyword,
}

impl From<BlockArg> for BlockKind {
    fn from(arg: BlockArg) -> Self {
        match arg {
            BlockArg::Site => BlockKind::Site,
            BlockArg::Employer => BlockKind::Employer,
            BlockArg::Keyword => BlockKind::Keyword,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut ctx = AppContext::load(&cli.config)?;
    let json = cli.format == "json";

    match cli.command {
        Commands::Select { task, vram, check, recommendations } => {
            run_select(&ctx, task.parse()?, vram, check, recommendations, json).await
        }
        Commands::Ask { prompt, context, local } => run_ask(&mut ctx, &prompt, &context, local).await,
        Commands::Score { input, criteria, batch_size, threshold, all } => {
            run_score(&ctx, input, criteria, batch_size, threshold, all, json).await
        }
        Commands::Search { query, count, no_dedup, sort_by, track } => {
            run_search(&ctx, &query, count, no_dedup, sort_by, track, json).await
        }
        Commands::Track { action } => run_track(&ctx, action, json),
        Commands::Validate { text, pressure } => run_validate(&ctx, &text, pressure, json),
        Commands::ParsePatent { path, analyze } => run_parse_patent(&ctx, path, analyze, json).await,
        Commands::Review { repo, pr, post } => run_review(&ctx, &repo, pr, post).await,
        Commands::Setup { task, vram, model, pull, env_file, no_env, skip_verify } => {
            run_setup(&ctx, task.parse()?, vram, model, pull, env_file, no_env, skip_verify).await
        }
        Commands::Config { action } => run_config_command(&mut ctx, action),
        Commands::Status => run_status(&ctx).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_select(
    ctx: &AppContext,
    task: TaskType,
    vram: Option<f64>,
    check: bool,
    recommendations: bool,
    json: bool,
) -> Result<()> {
    let selector = ctx.model_selector(vram)?;
    let model = selector.select_model(task, check).await;

    if json {
        return print_json(&serde_json::json!({
            "task": task,
            "vram_gb": selector.vram_gb,
            "tier": selector.tier().as_str(),
            "model": model,
            "recommendations": selector.recommendations(task),
        }));
    }

    if recommendations {
        println!("{}", selector.render_recommendations(task));
    }
    println!("{}", model);
    Ok(())
}

async fn run_ask(ctx: &mut AppContext, prompt: &str, context: &[String], local: bool) -> Result<()> {
    let mut prompt_context = PromptContext::new();
    for entry in context {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| AsmfError::InvalidInput(format!("context entry '{}' is not KEY=VALUE", entry)))?;
        prompt_context.insert(key.trim().to_string(), value.trim().to_string());
    }

    if local {
        ctx.config.llm.prefer_local = true;
    }
    let provider = ctx.select_provider().await?;
    let context = (!prompt_context.is_empty()).then_some(&prompt_context);
    let answer = provider.analyze(prompt, context).await?;
    println!("{}", answer.trim());
    Ok(())
}

async fn run_score(
    ctx: &AppContext,
    input: PathBuf,
    criteria: Option<String>,
    batch_size: Option<usize>,
    threshold: Option<f64>,
    all: bool,
    json: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(&input)?;
    let items: Vec<Value> = match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => items,
        _ => return Err(AsmfError::InvalidInput(format!("{:?} must contain a JSON array", input))),
    };

    let evaluation = &ctx.config.evaluation;
    let criteria = criteria.unwrap_or_else(|| evaluation.criteria.clone());
    let criteria = format!("{}\n{}", ctx.config.system_instructions, criteria);
    let provider = ctx.select_provider().await?;

    let scored = batch_evaluate(
        provider.as_ref(),
        &items,
        &criteria,
        batch_size.unwrap_or(evaluation.batch_size),
    )
    .await;
    let threshold = threshold.unwrap_or(evaluation.score_threshold);
    let total = scored.len();
    let shown = if all { scored } else { passing(scored, threshold) };

    if json {
        return print_json(&shown);
    }
    for s in &shown {
        let title = s.item.get("title").and_then(Value::as_str).map(str::to_string);
        println!("{:.2}  {}", s.score, title.unwrap_or_else(|| s.item.to_string()));
    }
    info!("{} of {} items at or above {}", shown.iter().filter(|s| s.score >= threshold).count(), total, threshold);
    Ok(())
}

async fn run_search(
    ctx: &AppContext,
    query: &str,
    count: usize,
    no_dedup: bool,
    sort_by: Option<String>,
    track: bool,
    json: bool,
) -> Result<()> {
    let aggregator = ctx.aggregator()?;
    if aggregator.provider_names().is_empty() {
        warn!("No search sources are enabled; add some under \"providers\" in the config");
    }

    let options = SearchOptions {
        count,
        deduplicate: ctx.config.deduplication.enabled && !no_dedup,
        sort_by,
    };
    let results = aggregator.search(query, &options).await;

    if track {
        let mut tracker = ctx.tracker()?;
        let mut added = 0;
        for result in &results {
            if tracker.track_result(result, Status::New)?.is_some() {
                added += 1;
            }
        }
        info!("Tracked {} new items", added);
    }

    if json {
        return print_json(&results);
    }
    for (i, r) in results.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, r.title, r.source);
        println!("   {}", r.link);
    }
    Ok(())
}

fn run_track(ctx: &AppContext, action: TrackCommands, json: bool) -> Result<()> {
    let mut tracker = ctx.tracker()?;

    match action {
        TrackCommands::Add { title, link, description, status } => {
            let mut item = Map::new();
            item.insert("title".to_string(), Value::String(title));
            item.insert("link".to_string(), Value::String(link));
            item.insert("description".to_string(), Value::String(description));
            match tracker.track(&item, status.parse()?)? {
                Some(id) => println!("Tracked {}", id),
                None => println!("Already tracked"),
            }
        }
        TrackCommands::List { status } => {
            let status = status.map(|s| s.parse::<Status>()).transpose()?;
            let items = tracker.get_all(status);
            if json {
                return print_json(&items);
            }
            for item in items {
                println!("{}  {:<11}  {}", item.id, item.status, item.field_str("title"));
            }
        }
        TrackCommands::Update { id, status, note } => {
            tracker.update_status(&id, status.parse()?, note.as_deref())?;
            println!("Updated {} to {}", id, status);
        }
        TrackCommands::Delete { id } => {
            if tracker.delete(&id)? {
                println!("Deleted {}", id);
            } else {
                return Err(AsmfError::NotFound(id));
            }
        }
        TrackCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing all tracked items");
                return Ok(());
            }
            tracker.clear_all()?;
            println!("Tracker cleared");
        }
        TrackCommands::Stats => {
            let stats = tracker.stats();
            if json {
                return print_json(&stats);
            }
            for (status, count) in stats {
                println!("{:<12} {}", status, count);
            }
        }
        TrackCommands::Export { output, status } => {
            let status = status.map(|s| s.parse::<Status>()).transpose()?;
            let rows = tracker.export_csv(&output, status)?;
            println!("Exported {} items to {:?}", rows, output);
        }
    }

    Ok(())
}

fn run_validate(ctx: &AppContext, text: &str, pressure: Option<f64>, json: bool) -> Result<()> {
    let expert = ctx.domain_expert();
    let temperature = expert.validate_temperature_claim(text);
    let mass_balance = expert.check_mass_balance(text);
    let equipment = expert.validate_equipment_design(text);
    let process = expert.identify_process_type(text);
    let pressure_ok = pressure.map(|p| expert.config().validate_pressure(p));

    if json {
        return print_json(&serde_json::json!({
            "domain": expert.config().name,
            "process_type": process,
            "temperature": temperature,
            "mass_balance": mass_balance,
            "equipment": equipment,
            "pressure_valid": pressure_ok,
        }));
    }

    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    println!("Domain: {}", expert.config().name);
    if let Some(process) = &process {
        println!("Process: {}", process);
    }
    println!("{} Temperature: {}", mark(temperature.valid), temperature.reason);
    println!("{} Mass balance: {}", mark(mass_balance.valid), mass_balance.reason);
    println!("{} Equipment: {}", mark(equipment.valid), equipment.reason);
    if let Some(warning) = &equipment.warning {
        println!("  ⚠ {}", warning);
    }
    if let (Some(p), Some(ok)) = (pressure, pressure_ok) {
        println!("{} Pressure: {} bar", mark(ok), p);
    }
    Ok(())
}

async fn run_parse_patent(ctx: &AppContext, path: PathBuf, analyze: bool, json: bool) -> Result<()> {
    let doc = patent::parse_pdf(&path)?;

    if analyze {
        let provider: Arc<dyn AiProvider> = Arc::from(ctx.select_provider().await?);
        let analyzer = ClaimAnalyzer::new(provider, ctx.domain_expert());
        let assessments = analyzer.batch_analyze(&doc.claims).await?;
        if json {
            return print_json(&serde_json::json!({"patent": doc, "assessments": assessments}));
        }
        for a in &assessments {
            let verdict = if a.plausible() { "plausible" } else { "check" };
            println!("Claim {} ({:?}, {}):\n{}\n", a.number, a.claim_type, verdict, a.assessment);
        }
        return Ok(());
    }

    if json {
        return print_json(&doc);
    }
    println!("Title: {}", doc.title.as_deref().unwrap_or("(unknown)"));
    if let Some(abstract_text) = &doc.abstract_text {
        println!("\nAbstract:\n{}", abstract_text);
    }
    println!(
        "\nClaims: {} ({} independent, {} dependent)",
        doc.claims.len(),
        doc.independent_claims().count(),
        doc.dependent_claims().count()
    );
    for claim in &doc.claims {
        let deps = if claim.depends_on.is_empty() {
            String::new()
        } else {
            format!(" -> {:?}", claim.depends_on)
        };
        println!("  {}.{} {}", claim.number, deps, claim.text);
    }
    Ok(())
}

async fn run_review(ctx: &AppContext, repo: &str, pr: u64, post: bool) -> Result<()> {
    let reviewer = OllamaReviewer::from_config(&ctx.config)?;
    let review = reviewer.review(repo, pr).await?;
    println!("{}", review);
    if post {
        reviewer.post_comment(repo, pr, &review).await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_setup(
    ctx: &AppContext,
    task: TaskType,
    vram: Option<f64>,
    model: Option<String>,
    pull: bool,
    env_file: PathBuf,
    no_env: bool,
    skip_verify: bool,
) -> Result<()> {
    println!("Ollama setup for asmf\n");

    match setup::ollama_version() {
        Some(version) => println!("✓ Ollama is installed: {}", version),
        None => {
            println!("✗ Ollama is not installed");
            println!("  Windows/Mac: https://ollama.ai/download");
            println!("  Linux: curl -fsSL https://ollama.ai/install.sh | sh");
            return Err(AsmfError::Config("Ollama is not installed".to_string()));
        }
    }

    let client = ctx.ollama_client()?;
    if let Err(e) = client.health_check().await {
        println!("✗ Ollama service is not running");
        println!("  macOS: launch Ollama.app; Linux: sudo systemctl start ollama");
        return Err(e);
    }
    println!("✓ Ollama service is running");

    let selector = ctx.model_selector(vram)?;
    println!("{}", selector.render_recommendations(task));

    let installed = client.list_models().await.unwrap_or_default();
    if installed.is_empty() {
        println!("⚠ No models installed yet");
    } else {
        println!("Installed models:");
        for m in &installed {
            println!("  • {}", m);
        }
    }

    let model = model.unwrap_or_else(|| selector.pick_from(task, &installed).to_string());
    if pull && !installed.contains(&model) {
        client.pull_model(&model).await?;
        println!("✓ Pulled {}", model);
    }

    if !no_env {
        setup::write_env_file(&env_file, &setup::env_settings(client.base_url(), &model, true))?;
        println!("✓ Updated {:?}", env_file);
    }

    if !skip_verify {
        match setup::verify_installation(&client).await {
            Ok(reply) => println!("✓ Test inference successful: {}...", reply),
            Err(e) => println!("⚠ Verification failed: {}", e),
        }
    }

    println!("\nConfigured model: {}", model);
    Ok(())
}

fn run_config_command(ctx: &mut AppContext, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => print_json(&ctx.config.redacted())?,
        ConfigCommands::Generate { output } => {
            asmf::AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Get { key } => match ctx.config.get(&key) {
            Some(value) => print_json(&value)?,
            None => return Err(AsmfError::NotFound(format!("config key {}", key))),
        },
        ConfigCommands::Set { key, value } => {
            let parsed = serde_json::from_str(&value).unwrap_or(Value::String(value));
            ctx.config.set(&key, parsed)?;
            ctx.save_config()?;
            println!("Set {}", key);
        }
        ConfigCommands::Block { kind, value, reason } => {
            if ctx.config.add_blocked_entity(kind.into(), &value, &reason) {
                ctx.save_config()?;
                println!("Blocked {:?} {}", kind, value);
            } else {
                println!("Already blocked");
            }
        }
        ConfigCommands::Unblock { kind, value } => {
            if ctx.config.remove_blocked_entity(kind.into(), &value) {
                ctx.save_config()?;
                println!("Unblocked {:?} {}", kind, value);
            } else {
                return Err(AsmfError::NotFound(format!("block rule {:?} {}", kind, value)));
            }
        }
    }

    Ok(())
}

async fn run_status(ctx: &AppContext) -> Result<()> {
    println!("asmf v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    println!("\nAI providers (prefer_local: {}):", ctx.config.llm.prefer_local);
    for status in ctx.provider_selector().status(ctx.config.llm.prefer_local).await {
        let mark = if status.available { "✓" } else { "✗" };
        println!("  {} {} - {}", mark, status.name, status.detail);
    }

    let client = ctx.ollama_client()?;
    match client.list_models().await {
        Ok(models) => {
            println!("\nOllama models at {}:", client.base_url());
            for m in &models {
                let marker = if *m == ctx.config.llm.ollama.model { "→" } else { " " };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("\nOllama: Error - {}", e),
    }

    match ctx.tracker() {
        Ok(tracker) => {
            println!("\nTracker ({}):", tracker.path().display());
            for (status, count) in tracker.stats() {
                println!("  {:<12} {}", status, count);
            }
        }
        Err(e) => println!("\nTracker: ✗ Error - {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_select_command() {
        let cli = Cli::try_parse_from(["asmf", "select", "--task", "code_review", "--vram", "10"]).unwrap();
        match cli.command {
            Commands::Select { task, vram, check, .. } => {
                assert_eq!(task.parse::<TaskType>().unwrap(), TaskType::CodeReview);
                assert_eq!(vram, Some(10.0));
                assert!(!check);
            }
            _ => panic!("Expected Select command"),
        }
    }

    #[test]
    fn test_cli_track_update() {
        let cli = Cli::try_parse_from(["asmf", "-v", "track", "update", "abc123", "in_progress", "--note", "applied"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Track { action: TrackCommands::Update { id, status, note } } => {
                assert_eq!(id, "abc123");
                assert_eq!(status.parse::<Status>().unwrap(), Status::InProgress);
                assert_eq!(note.as_deref(), Some("applied"));
            }
            _ => panic!("Expected Track Update command"),
        }
    }

    #[test]
    fn test_cli_search_ascending_sort() {
        let cli = Cli::try_parse_from(["asmf", "search", "rust jobs", "--sort-by", "-timestamp"]).unwrap();
        match cli.command {
            Commands::Search { query, sort_by, count, .. } => {
                assert_eq!(query, "rust jobs");
                assert_eq!(sort_by.as_deref(), Some("-timestamp"));
                assert_eq!(count, 10);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_config_block() {
        let cli = Cli::try_parse_from(["asmf", "config", "block", "site", "spam.example", "--reason", "spam"]).unwrap();
        match cli.command {
            Commands::Config { action: ConfigCommands::Block { kind, value, reason } } => {
                assert_eq!(BlockKind::from(kind), BlockKind::Site);
                assert_eq!(value, "spam.example");
                assert_eq!(reason, "spam");
            }
            _ => panic!("Expected Config Block command"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["asmf"]).is_err());
    }
}
