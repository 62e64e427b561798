//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kvsync")]
#[command(about = "Reconcile remote key-value maps against a desired state")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the current contents of a map
    Export(MapArgs),
    /// Show what apply would change
    Diff(DesiredArgs),
    /// Converge a map to the desired state
    Apply(ApplyArgs),
    /// Create an empty map (no-op if it already exists)
    CreateMap(CreateMapArgs),
}

#[derive(Args)]
pub struct MapArgs {
    /// Map name
    pub map: String,
}

#[derive(Args)]
pub struct DesiredArgs {
    /// Map name
    pub map: String,
    /// JSON file with the desired entries
    pub desired: PathBuf,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: DesiredArgs,
    /// Compute changes without writing
    #[arg(long)]
    pub dry_run: bool,
    /// Create the map first if it does not exist
    #[arg(long)]
    pub create_map: bool,
    /// Create the map encrypted (with --create-map)
    #[arg(long, requires = "create_map")]
    pub encrypted: bool,
    /// Refuse to write when the map could not be read completely
    #[arg(long)]
    pub require_complete: bool,
}

#[derive(Args)]
pub struct CreateMapArgs {
    /// Map name
    pub map: String,
    /// Create the map encrypted
    #[arg(long)]
    pub encrypted: bool,
}
