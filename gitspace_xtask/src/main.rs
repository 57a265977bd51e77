use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use gitspace_store::{GitspaceStore, PathApi, load_or_init_config};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Migrate(args) => migrate(args).await,
        Command::Resolve(args) => resolve(args).await,
        Command::Health(args) => check_health(args).await,
    }
}

#[derive(Parser)]
#[command(author, version, about = "Admin utilities for gitspace datastores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the datastore schema.
    Migrate(MigrateArgs),
    /// Resolve a path (primary or alias) to the space or repository it names.
    Resolve(ResolveArgs),
    /// Scan the path table for namespace invariant violations.
    Health(HealthArgs),
}

#[derive(Parser)]
struct MigrateArgs {
    /// Directory holding gitspace.json (created with defaults when missing).
    #[arg(long, default_value = ".gitspace")]
    datastore: PathBuf,
}

#[derive(Parser)]
struct ResolveArgs {
    #[arg(long, default_value = ".gitspace")]
    datastore: PathBuf,
    /// Path value, e.g. `acme/repo1`.
    path: String,
}

#[derive(Parser)]
struct HealthArgs {
    #[arg(long, default_value = ".gitspace")]
    datastore: PathBuf,
    /// Reduce output to violations only.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

async fn open(datastore: &Path) -> Result<GitspaceStore> {
    let config = load_or_init_config(datastore)
        .with_context(|| format!("load config under {}", datastore.display()))?;
    GitspaceStore::connect(&config, datastore)
        .await
        .with_context(|| format!("open datastore {}", datastore.display()))
}

async fn migrate(args: MigrateArgs) -> Result<()> {
    let store = open(&args.datastore).await?;
    info!("migrations applied");
    println!(
        "Datastore {} is up to date ({})",
        args.datastore.display(),
        store.backend_name()
    );
    Ok(())
}

async fn resolve(args: ResolveArgs) -> Result<()> {
    let store = open(&args.datastore).await?;
    let path = store
        .find_path_by_value(&args.path)
        .await
        .with_context(|| format!("resolve '{}'", args.path))?;
    let primary = if path.is_alias {
        store
            .find_primary_path(path.target())
            .await
            .with_context(|| format!("primary path of {}", path.target()))?
            .value
    } else {
        path.value.clone()
    };
    println!("target type: {}", path.target_type);
    println!("target id:   {}", path.target_id);
    println!("alias:       {}", path.is_alias);
    println!("primary:     {primary}");
    Ok(())
}

async fn check_health(args: HealthArgs) -> Result<()> {
    let store = open(&args.datastore).await?;
    let report = store
        .paths()
        .integrity_report(store.connection())
        .await
        .context("scan path table")?;

    if !args.quiet {
        println!("Datastore: {}", args.datastore.display());
        println!("Paths scanned: {}", report.paths_scanned);
        println!("Targets scanned: {}", report.targets_scanned);
    }
    if report.is_healthy() {
        if !args.quiet {
            println!("Namespace healthy");
        }
        return Ok(());
    }
    for violation in &report.violations {
        eprintln!("error: {violation}");
    }
    Err(anyhow!(
        "health check failed ({} violations)",
        report.violations.len()
    ))
}
