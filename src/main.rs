use std::path::PathBuf;

use artifact_sync::sync::server;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "artifact-sync")]
#[command(version, about = "Keeps registered artifact versions in sync with their sources")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: Options,
}

#[derive(Args, Clone, Default)]
struct Options {
    /// Path to the JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Delivery config manifest to apply on startup (repeatable)
    #[arg(long = "manifest", global = true)]
    manifests: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sync daemon until interrupted (default)
    Run,
    /// Run a single sweep and print the report as JSON
    Sync,
    /// Store a JSON array of published artifacts and print the new versions
    Publish {
        /// File holding the published artifacts
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Options { config, manifests } = cli.options;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => runtime.block_on(server::run_server(config, manifests)),
        Command::Sync => {
            let report = runtime.block_on(server::run_once(config, manifests))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Publish { file } => {
            let stored = runtime.block_on(server::run_publish(config, manifests, file))?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
    }
}
