use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{Position, Range};
use utsushi::config::{Settings, load_settings, load_user_settings};
use utsushi::document::{DocumentManager, LanguageKind};
use utsushi::error::{UtsushiError, UtsushiResult};
use utsushi::fixture::Fixture;
use utsushi::projection::{ProjectionEngine, map_range_in};

/// Inspect host/virtual document projection without an editor
#[derive(Parser)]
#[command(name = "utsushi")]
#[command(version)]
#[command(about = "Inspect host/virtual document projection without an editor")]
struct Cli {
    /// Settings file (default: the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a host position from a fixture and map it back
    Project {
        /// TOML fixture describing the host and its virtual documents
        fixture: PathBuf,

        /// Zero-based host line
        #[arg(long)]
        line: u32,

        /// Zero-based UTF-16 column
        #[arg(long)]
        character: u32,
    },
    /// Print the effective settings
    Config,
}

#[derive(Serialize)]
struct ProjectReport {
    host_uri: String,
    host_version: u64,
    position: Position,
    projection: Option<ProjectionReport>,
}

#[derive(Serialize)]
struct ProjectionReport {
    language: LanguageKind,
    uri: String,
    position: Position,
    /// The projected position mapped back into the host.
    round_trip: Option<Range>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> UtsushiResult<()> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => load_user_settings()?,
    };

    match cli.command {
        Commands::Project {
            fixture,
            line,
            character,
        } => project(&settings, &fixture, Position { line, character }),
        Commands::Config => {
            let text = toml::to_string_pretty(&settings)
                .map_err(|err| UtsushiError::internal(err.to_string()))?;
            print!("{}", text);
            Ok(())
        }
    }
}

fn project(settings: &Settings, fixture: &Path, position: Position) -> UtsushiResult<()> {
    let fixture = Fixture::load(fixture)?;
    let manager = Arc::new(DocumentManager::new(settings.event_buffer));
    let host = fixture.open_in(&manager)?;
    let engine = ProjectionEngine::new(Arc::clone(&manager));

    let projection = engine
        .get_projection(&host, position, &CancellationToken::new())
        .map(|projection| ProjectionReport {
            language: projection.language,
            uri: projection.uri.to_string(),
            position: projection.position,
            round_trip: map_range_in(
                &host,
                projection.language,
                Range {
                    start: projection.position,
                    end: projection.position,
                },
            )
            .map(|mapped| mapped.range),
        });

    let report = ProjectReport {
        host_uri: host.uri().to_string(),
        host_version: host.version(),
        position,
        projection,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
