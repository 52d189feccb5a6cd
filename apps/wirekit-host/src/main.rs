use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use wirekit::{Classifier, Component, Logger, Node, TypeCatalog};
use wirekit_bootstrap::{AppConfig, CliArgs};

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

mod startup;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// Ensure component modules are linked and registered via inventory
#[allow(dead_code)]
fn _ensure_modules_linked() {
    let _ = std::any::type_name::<greeter::Welcome>();
}

/// Wirekit host - composes registered components into a running process
#[derive(Parser)]
#[command(name = "wirekit-host")]
#[command(about = "Wirekit host - composes registered components into a running process")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding services.txt and modules.txt (overrides config)
    #[arg(short, long)]
    manifest_dir: Option<PathBuf>,

    /// Abort on the first constructor failure (overrides config)
    #[arg(long)]
    strict: bool,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency tree and instantiate every component
    Run,
    /// Build and validate the dependency tree without instantiating it
    Check,
    /// Print the classified contracts and implementations
    List,
}

fn main() -> ExitCode {
    _ensure_modules_linked();

    let cli = Cli::parse();
    match real_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Startup failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(startup::exit_code(&e))
        }
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        manifest_dir: cli
            .manifest_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        strict: cli.strict,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (WIREKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let base_dir = wirekit_bootstrap::base_dir(cli.config.as_deref());
    let logging_config = config.logging.clone().unwrap_or_default();
    wirekit_bootstrap::init_logging(&logging_config, &base_dir);

    tracing::info!("Wirekit host starting");

    // Dispatch subcommands (default: run)
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, &base_dir),
        Commands::Check => check(&config, &base_dir),
        Commands::List => list(&config, &base_dir),
    }
}

fn run(config: &AppConfig, base_dir: &Path) -> Result<()> {
    let started = Instant::now();
    let root = startup::root_logger();
    let tree = startup::build_tree(config, base_dir, &root)?;
    tree.instantiate_all()?;

    let total = tree.implementations().count();
    let built = tree
        .implementations()
        .filter(|n| n.last_instance().is_some())
        .count();
    tracing::info!(
        built,
        total,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Startup complete"
    );
    Ok(())
}

fn check(config: &AppConfig, base_dir: &Path) -> Result<()> {
    tracing::info!("Checking the dependency tree…");
    let tree = startup::build_tree(config, base_dir, &startup::root_logger())?;

    println!(
        "Dependency tree is valid: {} contracts, {} implementations",
        tree.contracts().count(),
        tree.implementations().count()
    );
    for (contract, implementation) in tree.repaired_edges() {
        println!("  cycle repaired: {contract} no longer uses {implementation}");
    }
    for contract in tree.contracts() {
        match contract.preferred_implementation() {
            Some(preferred) => println!("  {} -> {}", contract.name(), preferred.name()),
            None => println!("  {} -> (none)", contract.name()),
        }
    }
    Ok(())
}

fn list(config: &AppConfig, base_dir: &Path) -> Result<()> {
    let root = startup::root_logger();
    let core = root.child(startup::CORE_LOGGER);
    let catalog = TypeCatalog::discover();
    let classifier = Classifier::default();
    let mut components =
        startup::select_components(config, base_dir, &catalog, &classifier, core.as_ref())?;
    components.sort_by(|a, b| a.name().cmp(b.name()));

    for component in &components {
        match component.as_ref() {
            Component::Contract(contract) => println!(
                "contract        {} {}{}",
                contract.name(),
                contract.version(),
                if contract.is_unique() { " unique" } else { "" }
            ),
            Component::Implementation(implementation) => {
                println!("implementation  {}", implementation.name());
                for dependency in implementation.dependencies() {
                    println!(
                        "    needs {} {}{}",
                        dependency.target,
                        dependency.version,
                        if dependency.lazy { " (lazy)" } else { "" }
                    );
                }
            }
        }
    }
    Ok(())
}
