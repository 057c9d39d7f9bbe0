use clap::{Parser, Subcommand};
use sdnroute::config;
use sdnroute::scenario::Scenario;
use sdnroute::telemetry::init_logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sdnroute")]
#[command(about = "Forwarding core of a software-defined network controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Replay a scenario against recording switches
    Simulate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Path to the scenario file
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print config.toml with every default filled in
    Show {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            init_logging(None);
            match action {
                ConfigAction::Validate { config } => cmd_config_validate(&config),
                ConfigAction::Show { config } => cmd_config_show(&config),
            }
        }
        Commands::Simulate { config, scenario } => cmd_simulate(&config, &scenario),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| e.to_string())?;
    let result = config::validate(&cfg);
    result.print_diagnostics();

    if result.has_errors() {
        return Err(format!(
            "Validation failed with {} error(s)",
            result.errors.len()
        ));
    }

    println!("Configuration is valid.");
    Ok(())
}

fn cmd_config_show(config_path: &PathBuf) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| e.to_string())?;
    let rendered = config::render(&cfg).map_err(|e| e.to_string())?;
    print!("{}", rendered);
    Ok(())
}

fn cmd_simulate(config_path: &PathBuf, scenario_path: &PathBuf) -> Result<(), String> {
    use tokio::runtime::Runtime;

    let cfg = config::load(config_path).map_err(|e| e.to_string())?;
    init_logging(Some(&cfg.logging));

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Configuration has errors, not simulating".to_string());
    }

    let scenario = Scenario::load(scenario_path).map_err(|e| e.to_string())?;
    info!(
        "Replaying {} events over {} switches",
        scenario.events.len(),
        scenario.topology.switches.len()
    );

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    let report = rt
        .block_on(scenario.run(&cfg))
        .map_err(|e| e.to_string())?;

    for command in &report.commands {
        info!("{}", command);
    }
    for (prefix, nexthop) in &report.routes {
        info!("route {} via {}", prefix, nexthop);
    }
    for (name, value) in &report.metrics {
        println!("{} {}", name, value);
    }
    Ok(())
}
