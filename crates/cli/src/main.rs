//! vouch - repository maintainer tool for signed trust metadata
//!
//! Creates and maintains a metadata repository: top-level role keys,
//! signing thresholds, target registration, path delegation, root key
//! rotation, and consistent-snapshot publishing.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod repo;

use repo::Maintainer;

/// vouch - repository maintainer tool for signed trust metadata
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the metadata repository directory
    #[arg(short, long, default_value = "repository")]
    repo: PathBuf,

    /// Path to the signing keys directory
    #[arg(short, long, default_value = "keys")]
    keys: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new repository with fresh keys for every top-level role
    Init {
        /// Number of root signing keys to generate
        #[arg(long, default_value = "2")]
        root_keys: u32,

        /// Signatures required to trust root metadata
        #[arg(long, default_value = "1")]
        root_threshold: u32,

        /// Publish mutable unversioned filenames instead of consistent
        /// snapshots
        #[arg(long)]
        no_consistent_snapshot: bool,
    },

    /// Register a file in targets and republish the chain
    AddTarget {
        /// Local file to protect
        file: PathBuf,

        /// Target path clients will request; defaults to the file name
        #[arg(long)]
        path: Option<String>,
    },

    /// Delegate a path pattern to a new role with a fresh key
    Delegate {
        /// Name of the delegate role
        name: String,

        /// Path pattern the delegate may claim, e.g. "x/*"
        pattern: String,
    },

    /// Add a new root key and publish a dual-threshold rotation
    RotateRoot,

    /// Set a role's signature threshold and republish root
    SetThreshold {
        /// Role name
        role: String,

        /// Required number of signatures
        threshold: u32,
    },

    /// Resolve a target path through the delegation graph
    Resolve {
        /// Target path to look up
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    match args.command {
        Command::Init {
            root_keys,
            root_threshold,
            no_consistent_snapshot,
        } => {
            Maintainer::init(
                &args.repo,
                &args.keys,
                root_keys,
                root_threshold,
                !no_consistent_snapshot,
            )
            .await?;
            println!("initialized repository at {}", args.repo.display());
        }
        Command::AddTarget { file, path } => {
            let target_path = match path {
                Some(path) => path,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("cannot derive target path from file name"))?,
            };
            let mut session = Maintainer::open(&args.repo, &args.keys).await?;
            session.add_target(&file, &target_path).await?;
            println!("added target {target_path}");
        }
        Command::Delegate { name, pattern } => {
            let mut session = Maintainer::open(&args.repo, &args.keys).await?;
            session.delegate(&name, &pattern).await?;
            println!("delegated {pattern} to {name}");
        }
        Command::RotateRoot => {
            let mut session = Maintainer::open(&args.repo, &args.keys).await?;
            session.rotate_root().await?;
            println!("root rotated");
        }
        Command::SetThreshold { role, threshold } => {
            let mut session = Maintainer::open(&args.repo, &args.keys).await?;
            session.set_threshold(&role, threshold).await?;
            println!("threshold for {role} set to {threshold}");
        }
        Command::Resolve { path } => {
            let session = Maintainer::open(&args.repo, &args.keys).await?;
            let info = session.resolve(&path)?;
            println!("{path}: {} bytes", info.length);
            for (algo, digest) in &info.hashes {
                println!("  {algo}: {digest}");
            }
        }
    }

    Ok(())
}
