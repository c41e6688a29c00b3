//! Seekers DST Simulator CLI
//!
//! Run deterministic simulation scenarios against the game loop.

use clap::Parser;
use seekers_core::GameConfig;
use seekers_sim::scenarios::ScenarioId;
use seekers_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Seekers Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "seekers-sim")]
#[command(about = "Run deterministic simulation scenarios for the seekers arena", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Scenario to run (head_on, magnet_duel, timeout, careful_drop, misbehaving,
    /// remote_match, determinism, full_match, color_clash, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,
    
    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,
    
    /// Tick budget for the full-length scenarios
    #[arg(short, long)]
    ticks: Option<u64>,
    
    /// Match configuration as JSON (missing fields take defaults)
    #[arg(short, long)]
    config: Option<String>,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
    
    /// Export the scenario's frames to a JSON file for external renderers
    #[arg(long)]
    export: Option<String>,
}

fn load_config(path: &str) -> Result<GameConfig, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    GameConfig::from_json_str(&text).map_err(|e| format!("invalid config {}: {}", path, e))
}

fn main() {
    let args = Args::parse();
    
    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
    
    if !args.json {
        info!("Seekers DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };
    
    let config = match args.config.as_deref().map(load_config) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        None => GameConfig::default(),
    };
    
    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        std::process::exit(1);
    }
    
    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };
    
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };
    
    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        
        let mut runner = ScenarioRunner::new(seed)
            .with_config(config.clone())
            .with_export(args.export.is_some());
        if let Some(ticks) = args.ticks {
            runner = runner.with_ticks(ticks);
        }
        
        for scenario in &scenarios {
            let result = runtime.block_on(runner.run(*scenario));
            
            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED in {} ticks", scenario.name(), seed, result.total_ticks);
                } else {
                    error!("✗ {} (seed={}) FAILED: {}", 
                        scenario.name(), 
                        seed, 
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            
            if let (Some(path), Some(export)) = (&args.export, &result.export) {
                match export.write_to_file(path) {
                    Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path),
                    Err(e) => error!("Export to {} failed: {}", path, e),
                }
            }
            
            if !result.passed {
                failed_count += 1;
            }
            
            all_results.push(result);
        }
    }
    
    // Summary
    let total = all_results.len();
    let passed = total - failed_count;
    
    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            
            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!("  - {} seed={}: {}", 
                        result.scenario,
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }
    
    if failed_count > 0 {
        std::process::exit(1);
    }
}
