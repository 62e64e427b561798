//! kvsync - reconcile remote key-value maps from the command line.
//!
//! Connection settings come from the environment (or a `.env` file); see
//! [`kvsync::Config`].

mod cli;

use crate::cli::{ApplyArgs, Cli, Commands};
use clap::Parser;
use kvsync::{
    Config, HttpMapClient, MapProvision, MapRef, ReconcileOptions, Reconciler, Snapshot,
};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for partial outcomes: failed writes or a truncated export.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let client = HttpMapClient::from_config(&config)?;
    let options = ReconcileOptions::from_config(&config);
    let map_ref = |map: &str| MapRef::new(&config.organization, &config.environment, map);

    match cli.command {
        Commands::Export(args) => {
            let reconciler = Reconciler::new(&client, options);
            let current = reconciler.materialize(&map_ref(&args.map)).await?;
            println!("{}", current.snapshot.to_json_pretty()?);
            if !current.is_complete() {
                eprintln!(
                    "warning: stopped after {} pages, export is incomplete",
                    current.pages
                );
                return Ok(ExitCode::from(EXIT_PARTIAL));
            }
        }
        Commands::Diff(args) => {
            let desired = read_desired(&args.desired)?;
            let reconciler = Reconciler::new(&client, options);
            let diff = reconciler.preview(&map_ref(&args.map), &desired).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else {
                print!("{}", diff);
            }
        }
        Commands::Apply(args) => {
            return apply(&client, options, map_ref(&args.target.map), &args, cli.json).await;
        }
        Commands::CreateMap(args) => {
            let reconciler = Reconciler::new(&client, options);
            match reconciler
                .ensure_map(&map_ref(&args.map), args.encrypted)
                .await?
            {
                MapProvision::Created => println!("created map {}", args.map),
                MapProvision::AlreadyExists => println!("map {} already exists", args.map),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn apply(
    client: &HttpMapClient,
    options: ReconcileOptions,
    map: MapRef,
    args: &ApplyArgs,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let desired = read_desired(&args.target.desired)?;
    let reconciler = Reconciler::new(
        client,
        options
            .dry_run(args.dry_run)
            .require_complete(args.require_complete)
            .missing_map_is_empty(args.create_map),
    );

    if args.create_map && !args.dry_run {
        reconciler.ensure_map(&map, args.encrypted).await?;
    }

    let outcome = reconciler.reconcile(&map, &desired).await?;
    let result = &outcome.result;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", outcome.diff);
        println!("{}", result);
        for error in &result.errors {
            println!("  failed to {} {}: {}", error.operation, error.name, error.message);
        }
    }

    if result.has_errors() {
        eprintln!(
            "{} is not fully converged: {} write(s) failed",
            map,
            result.errors.len()
        );
        return Ok(ExitCode::from(EXIT_PARTIAL));
    }
    if !result.snapshot_complete {
        eprintln!("warning: current state of {} was read partially", map);
    }

    Ok(ExitCode::SUCCESS)
}

fn read_desired(path: &Path) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(Snapshot::from_json(&raw)?)
}
