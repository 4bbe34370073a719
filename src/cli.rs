//! CLI interface for instincts

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Write;

use crate::clustering::EvolutionEngine;
use crate::confidence::{confidence_level, effective_confidence, ConfidenceLevel};
use crate::config::Config;
use crate::instinct::{Category, Instinct, InstinctStore};
use crate::observer;
use crate::porting;

#[derive(Parser)]
#[command(name = "instincts")]
#[command(about = "Learns trigger/action heuristics from observed tool usage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all learned instincts with confidence scores
    Status {
        /// Filter by domain
        #[arg(short, long)]
        domain: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Analyze the observation log and create or reinforce instincts
    Analyze,
    /// Cluster instincts and propose evolution into capabilities
    Evolve {
        /// Show what would be proposed without generating suggestions
        #[arg(long)]
        dry_run: bool,
    },
    /// Import instincts from a file or URL
    Import {
        /// File path or URL to import from
        source: String,
        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
        /// Minimum confidence threshold
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Export instincts for sharing
    Export {
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Filter by domain
        #[arg(short, long)]
        domain: Option<String>,
        /// Minimum confidence threshold
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Show effective confidence after time-based decay
    Decay {
        /// Weekly decay rate (default from config)
        #[arg(long)]
        decay_rate: Option<f64>,
    },
    /// Enforce the max-instincts limit by archiving stale records
    Prune {
        /// Maximum instincts to keep
        #[arg(long)]
        max_instincts: Option<usize>,
        /// Preview without archiving
        #[arg(long)]
        dry_run: bool,
    },
    /// Show or change configuration
    Config {
        /// Set a configuration value (KEY=VALUE, e.g. decay.rate=0.05)
        #[arg(long, value_name = "KEY=VALUE")]
        set: Option<String>,
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Status { domain, format } => {
            let store = open_store(&config)?;
            cmd_status(&store, &config, domain.as_deref(), format)?;
        }
        Commands::Analyze => {
            let store = open_store(&config)?;
            cmd_analyze(&store, &config)?;
        }
        Commands::Evolve { dry_run } => {
            let store = open_store(&config)?;
            cmd_evolve(&store, &config, dry_run)?;
        }
        Commands::Import {
            source,
            dry_run,
            force,
            min_confidence,
        } => {
            let store = open_store(&config)?;
            cmd_import(&store, &source, dry_run, force, min_confidence).await?;
        }
        Commands::Export {
            output,
            domain,
            min_confidence,
        } => {
            let store = open_store(&config)?;
            cmd_export(&store, output.as_deref(), domain.as_deref(), min_confidence)?;
        }
        Commands::Decay { decay_rate } => {
            let store = open_store(&config)?;
            cmd_decay(&store, decay_rate.unwrap_or(config.decay.rate))?;
        }
        Commands::Prune {
            max_instincts,
            dry_run,
        } => {
            let store = open_store(&config)?;
            cmd_prune(
                &store,
                &config,
                max_instincts.unwrap_or(config.retention.max_instincts),
                dry_run,
            )?;
        }
        Commands::Config { set, show } => {
            cmd_config(config, set.as_deref(), show)?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<InstinctStore> {
    InstinctStore::with_dir(config.resolved_data_dir()?)
}

fn cmd_status(
    store: &InstinctStore,
    config: &Config,
    domain: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut instincts = store.load_all()?;
    if let Some(domain) = domain {
        instincts.retain(|i| i.domain == domain);
    }

    if instincts.is_empty() {
        println!("No instincts found. Run some sessions to generate observations.");
        println!();
        println!("Instinct directories:");
        println!("  Personal:  {}", store.category_dir(Category::Personal).display());
        println!("  Inherited: {}", store.category_dir(Category::Inherited).display());
        return Ok(());
    }

    let by_level = |level: ConfidenceLevel| {
        instincts
            .iter()
            .filter(|i| confidence_level(i.confidence) == level)
            .collect::<Vec<_>>()
    };

    let high = by_level(ConfidenceLevel::High);
    let medium = by_level(ConfidenceLevel::Medium);
    let low = by_level(ConfidenceLevel::Low);

    if format == OutputFormat::Json {
        let level_entry = |i: &Instinct| {
            json!({
                "id": i.id,
                "confidence": i.confidence,
                "trigger": i.trigger,
                "domain": i.domain,
            })
        };
        let output = json!({
            "high": high.iter().map(|i| level_entry(i)).collect::<Vec<_>>(),
            "medium": medium.iter().map(|i| level_entry(i)).collect::<Vec<_>>(),
            "low": low.iter().map(|i| level_entry(i)).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let personal = instincts
        .iter()
        .filter(|i| i.source_category == Some(Category::Personal))
        .count();

    println!("Instinct Status - {} total", instincts.len());
    println!("===========================");
    println!("Personal:  {}", personal);
    println!("Inherited: {}", instincts.len() - personal);
    println!();

    let mut domains: Vec<&str> = instincts.iter().map(|i| i.domain.as_str()).collect();
    domains.sort_unstable();
    domains.dedup();

    for domain in domains {
        let mut members: Vec<&Instinct> =
            instincts.iter().filter(|i| i.domain == domain).collect();
        members.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        println!("## {} ({})", domain.to_uppercase(), members.len());
        for instinct in members {
            let filled = ((instinct.confidence * 10.0) as usize).min(10);
            let bar: String = "█".repeat(filled) + &"░".repeat(10 - filled);
            println!(
                "  {} {:3}%  {}",
                bar,
                (instinct.confidence * 100.0) as u32,
                instinct.id
            );
            println!("            trigger: {}", instinct.trigger);
            if !instinct.action.is_empty() {
                println!("            action: {}", truncate(&instinct.action, 60));
            }
        }
        println!();
    }

    println!("## Stats");
    println!(
        "Total: {} | High: {} | Medium: {} | Low: {}",
        instincts.len(),
        high.len(),
        medium.len(),
        low.len()
    );

    let observations = store.observation_count();
    if observations > 0 {
        println!("Observations: {} events logged", observations);
    }

    let mut engine = EvolutionEngine::new(
        config.evolution.min_cluster_size,
        config.evolution.min_avg_confidence,
    );
    engine.analyze(&instincts);
    let ready = engine.ready_clusters();
    if !ready.is_empty() {
        let summary: Vec<String> = ready
            .iter()
            .map(|c| format!("{} ({})", c.domain, c.count()))
            .collect();
        println!("Evolution ready: {}", summary.join(", "));
    }

    Ok(())
}

fn cmd_analyze(store: &InstinctStore, config: &Config) -> Result<()> {
    let report = observer::run_cycle(store, config)?;

    if report.observations == 0 {
        println!("No observations to analyze.");
        println!("Log file: {}", store.observations_path().display());
        return Ok(());
    }

    println!("Analyzed {} observations", report.observations);
    println!("Detected {} patterns", report.patterns_detected);
    println!(
        "Created {} new instincts, updated {}",
        report.created, report.updated
    );

    if !report.ready_domains.is_empty() {
        println!();
        println!(
            "Evolution opportunities: {} domains ready",
            report.ready_domains.len()
        );
        for (domain, count) in &report.ready_domains {
            println!("  - {}: {} instincts", domain, count);
        }
    }

    Ok(())
}

fn cmd_evolve(store: &InstinctStore, config: &Config, dry_run: bool) -> Result<()> {
    let instincts = store.load_all()?;
    if instincts.is_empty() {
        println!("No instincts to evolve. Run more sessions first.");
        return Ok(());
    }

    let mut engine = EvolutionEngine::new(
        config.evolution.min_cluster_size,
        config.evolution.min_avg_confidence,
    );
    engine.analyze(&instincts);

    if engine.clusters().is_empty() {
        println!("No clusters found. Need more instincts in the same domain.");
        return Ok(());
    }

    println!("Found {} potential clusters:", engine.clusters().len());
    println!();

    for cluster in engine.clusters() {
        println!("Domain: {}", cluster.domain);
        println!(
            "  Instincts: {} (avg confidence: {:.2})",
            cluster.count(),
            cluster.avg_confidence
        );
        println!("  Type: {}", cluster.capability_type);

        if dry_run {
            println!("  [Dry run] Would propose: {}", cluster.capability_type);
        } else {
            let suggestion = engine.suggest_evolution(cluster);
            println!("  Suggested name: {}", suggestion.name);
            println!("  Description: {}", suggestion.description);
        }
        println!();
    }

    let ready = engine.ready_clusters();
    if ready.is_empty() {
        println!("No clusters ready for evolution yet.");
    } else {
        println!("Ready for evolution: {} clusters", ready.len());
    }

    Ok(())
}

async fn cmd_import(
    store: &InstinctStore,
    source: &str,
    dry_run: bool,
    force: bool,
    min_confidence: Option<f64>,
) -> Result<()> {
    if source.starts_with("http://") || source.starts_with("https://") {
        println!("Fetching from URL: {}", source);
    }
    let content = porting::fetch_source(source).await?;

    let incoming = Instinct::parse_many(&content);
    if incoming.is_empty() {
        println!("No valid instincts found in source.");
        return Ok(());
    }
    println!("Found {} instincts to import.", incoming.len());
    println!();

    let existing = store.load_all()?;
    let plan = porting::plan_import(incoming, &existing, min_confidence.unwrap_or(0.0));

    if !plan.to_add.is_empty() {
        println!("NEW ({}):", plan.to_add.len());
        for instinct in &plan.to_add {
            println!("  + {} (confidence: {:.2})", instinct.id, instinct.confidence);
        }
    }
    if !plan.to_update.is_empty() {
        println!("UPDATE ({}):", plan.to_update.len());
        for instinct in &plan.to_update {
            println!("  ~ {} (confidence: {:.2})", instinct.id, instinct.confidence);
        }
    }
    if !plan.skipped.is_empty() {
        println!(
            "SKIP ({} - already exists with equal/higher confidence):",
            plan.skipped.len()
        );
        for instinct in plan.skipped.iter().take(5) {
            println!("  - {}", instinct.id);
        }
        if plan.skipped.len() > 5 {
            println!("  ... and {} more", plan.skipped.len() - 5);
        }
    }

    if dry_run {
        println!();
        println!("[DRY RUN] No changes made.");
        return Ok(());
    }

    if plan.is_empty() {
        println!();
        println!("Nothing to import.");
        return Ok(());
    }

    if !force {
        let prompt = format!(
            "Import {} new, update {}? [y/N] ",
            plan.to_add.len(),
            plan.to_update.len()
        );
        if !confirm(&prompt)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let added = plan.to_add.len();
    let updated = plan.to_update.len();
    let written = porting::apply_import(store, plan, source)?;

    println!();
    println!("Import complete!");
    println!("  Added: {}", added);
    println!("  Updated: {}", updated);
    println!("  Files saved:");
    for path in written {
        println!("    - {}", path.display());
    }

    Ok(())
}

fn cmd_export(
    store: &InstinctStore,
    output: Option<&str>,
    domain: Option<&str>,
    min_confidence: Option<f64>,
) -> Result<()> {
    let mut instincts = store.load_all()?;

    if let Some(domain) = domain {
        instincts.retain(|i| i.domain == domain);
    }
    if let Some(min_confidence) = min_confidence {
        instincts.retain(|i| i.confidence >= min_confidence);
    }

    if instincts.is_empty() {
        println!("No instincts match the criteria.");
        return Ok(());
    }

    let rendered = porting::render_export(&instincts);

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Exported {} instincts to {}", instincts.len(), path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

fn cmd_decay(store: &InstinctStore, decay_rate: f64) -> Result<()> {
    let instincts = store.load_all()?;
    if instincts.is_empty() {
        println!("No instincts found.");
        return Ok(());
    }

    let mut rows: Vec<(&Instinct, f64)> = instincts
        .iter()
        .map(|i| {
            let effective =
                effective_confidence(i.confidence, i.staleness_timestamp(), decay_rate);
            (i, effective)
        })
        .collect();

    // Most decayed first
    rows.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    println!(
        "Confidence Decay Analysis (rate: {:.0}%/week)",
        decay_rate * 100.0
    );
    println!("==========================================");
    println!();

    for (instinct, effective) in rows {
        let decay_amount = instinct.confidence - effective;
        if decay_amount > 0.01 {
            println!("{}:", instinct.id);
            println!(
                "  Base: {:.2} -> Effective: {:.2} (decay: -{:.2})",
                instinct.confidence, effective, decay_amount
            );
            println!(
                "  Last observed: {}",
                instinct.staleness_timestamp().unwrap_or("unknown")
            );
        } else {
            println!("{}: {:.2} (no decay)", instinct.id, instinct.confidence);
        }
    }

    Ok(())
}

fn cmd_prune(
    store: &InstinctStore,
    config: &Config,
    max_instincts: usize,
    dry_run: bool,
) -> Result<()> {
    let instincts = store.load_all()?;

    println!("Current instincts: {}", instincts.len());
    println!("Max limit: {}", max_instincts);

    if instincts.len() <= max_instincts {
        println!();
        println!("No pruning needed - within limit.");
        return Ok(());
    }

    // Rank by effective confidence so stale records go first
    let mut ranked: Vec<(Instinct, f64)> = instincts
        .into_iter()
        .map(|i| {
            let effective =
                effective_confidence(i.confidence, i.staleness_timestamp(), config.decay.rate);
            (i, effective)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let to_archive = &ranked[max_instincts..];

    if dry_run {
        println!();
        println!("[DRY RUN] Would archive {} instincts:", to_archive.len());
        for (instinct, effective) in to_archive {
            println!("  - {} (effective confidence: {:.2})", instinct.id, effective);
        }
        return Ok(());
    }

    println!();
    println!(
        "Archiving {} lowest-confidence instincts...",
        to_archive.len()
    );
    let mut archived = 0;
    for (instinct, effective) in to_archive {
        store.archive(instinct)?;
        println!(
            "Archived: {} (effective confidence: {:.2})",
            instinct.id, effective
        );
        archived += 1;
    }

    println!();
    println!(
        "Archived {} instincts to {}",
        archived,
        store.category_dir(Category::Archived).display()
    );

    Ok(())
}

fn cmd_config(mut config: Config, set: Option<&str>, show: bool) -> Result<()> {
    if let Some(assignment) = set {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got '{}'", assignment))?;

        if !config.set(key, value)? {
            anyhow::bail!("Unknown configuration key: {}", key);
        }
        config.save()?;
        println!("Set {} = {}", key, value);
        return Ok(());
    }

    // With no --set, always show
    let _ = show;
    println!("{}", toml::to_string_pretty(&config)?);
    println!("# config file: {}", crate::config::config_path()?.display());
    Ok(())
}

/// Ask a yes/no question on stdin; anything but y/yes declines.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world foo bar", 10), "hello w...");
    }

    #[test]
    fn test_confidence_bar_width() {
        for confidence in [0.0, 0.3, 0.55, 0.9, 1.0] {
            let filled = ((confidence * 10.0) as usize).min(10);
            let bar: String = "█".repeat(filled) + &"░".repeat(10 - filled);
            assert_eq!(bar.chars().count(), 10);
        }
    }
}
