mod app;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use remix_core::domain::ContentId;
use remix_separator::probe_tool;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Caché de pistas separadas, direccionada por contenido.
#[derive(Parser, Debug)]
#[command(name = "remix")]
#[command(about = "Content-addressed cache for separated audio stems")]
#[command(version)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Register an uploaded audio file (copied into the upload dir)
  Register {
    file: PathBuf,
    /// Display title (defaults to the file name)
    #[arg(long)]
    title: Option<String>,
  },
  /// Return valid stems for a file, separating it only when needed
  Ensure {
    /// Audio file; registered first if its content is new
    #[arg(required_unless_present_any = ["id", "name"], conflicts_with_all = ["id", "name"])]
    file: Option<PathBuf>,
    /// Content id of an already registered song
    #[arg(long, conflicts_with = "name")]
    id: Option<String>,
    /// File name of an already registered song (fails if ambiguous)
    #[arg(long)]
    name: Option<String>,
  },
  /// List registered songs
  List,
  /// Cache size, orphan count and utilization
  Report,
  /// Delete artifacts no song references
  Cleanup {
    /// Actually delete; without it only the orphan list is printed
    #[arg(long)]
    yes: bool,
  },
  /// Drop individual stems that no longer pass integrity checks
  Reindex,
  /// Remove a song from the ledger; its artifacts become orphans
  Remove { id: String },
  /// Print the content id of a file
  Fingerprint { file: PathBuf },
  /// Check that the separation engine and ffmpeg respond
  Check,
}

#[tokio::main]
async fn main() -> Result<()> {
  // Logs a stderr; stdout queda para el JSON.
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "remix=info,remix_core=info,remix_fs=info,remix_ledger=info,remix_separator=info".into()
      }),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let args = Args::parse();
  let app = App::from_config().await?;

  match args.command {
    Command::Register { file, title } => {
      let staged = app.stage_upload(&file).await?;
      let title = title.or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()));
      let outcome = app.orchestrator.register_upload(&staged, title.as_deref()).await?;
      print_json(&outcome)
    }

    Command::Ensure { file, id, name } => {
      let id = match (file, id, name) {
        (_, Some(raw), _) => parse_id(&raw)?,
        (_, None, Some(name)) => {
          let ledger = app.orchestrator.ledger();
          let ledger = ledger.lock().await;
          match ledger.find_by_display_name(&name) {
            Some(song) => song.id.clone(),
            None => bail!("no unique song named {name:?}"),
          }
        }
        (Some(file), None, None) => {
          let staged = app.stage_upload(&file).await?;
          let title = file.file_name().map(|n| n.to_string_lossy().into_owned());
          app.orchestrator.register_upload(&staged, title.as_deref()).await?.song().id.clone()
        }
        (None, None, None) => bail!("a file, --id or --name is required"),
      };

      let outcome = app.orchestrator.ensure_stems(&id).await?;
      info!(id = %id.short(), hit = outcome.is_cache_hit(), stems = outcome.stems.len(), "stems ready");
      print_json(&outcome)
    }

    Command::List => print_json(&app.orchestrator.list_songs().await),

    Command::Report => print_json(&app.diagnostics.report().await?),

    Command::Cleanup { yes } => {
      if !yes {
        let orphans = app.reconciler.find_orphans().await?;
        warn!(count = orphans.len(), "dry run, pass --yes to delete");
        return print_json(&json!({ "dry_run": true, "orphans": orphans }));
      }
      let report = app.reconciler.cleanup(true).await?;
      print_json(&report)
    }

    Command::Reindex => print_json(&app.orchestrator.rebuild_index().await?),

    Command::Remove { id } => {
      let song = app.orchestrator.remove_song(&parse_id(&id)?).await?;
      print_json(&song.summary())
    }

    Command::Fingerprint { file } => {
      let id = app.orchestrator.identify(&file).await?;
      print_json(&json!({ "file": file, "content_id": id }))
    }

    Command::Check => {
      let mut engine_args = app.separator.leading_args.clone();
      engine_args.push("--help".into());

      let engine = probe_tool(&app.separator.program, &engine_args, PROBE_TIMEOUT).await;
      let ffmpeg = probe_tool("ffmpeg", &["-version".to_string()], PROBE_TIMEOUT).await;

      if !engine.is_available() {
        warn!(program = %app.separator.program, "separation engine not available");
      }
      if !ffmpeg.is_available() {
        warn!("ffmpeg not available, see https://ffmpeg.org/download.html");
      }
      print_json(&json!({ "engine": engine, "ffmpeg": ffmpeg }))
    }
  }
}

fn parse_id(raw: &str) -> Result<ContentId> {
  ContentId::parse(raw).with_context(|| format!("invalid content id {raw:?}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
  println!("{out}");
  Ok(())
}
