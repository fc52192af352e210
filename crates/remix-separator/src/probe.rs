use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

/// Resultado de comprobar una herramienta externa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
  Available { version: String },
  Failed { code: Option<i32> },
  NotFound,
  TimedOut,
}

impl ToolStatus {
  pub fn is_available(&self) -> bool {
    matches!(self, ToolStatus::Available { .. })
  }
}

/// Lanza `program args..` y espera como mucho `timeout`.
///
/// `version` es la primera línea no vacía de stdout (o de stderr si stdout viene vacío).
pub async fn probe_tool(program: &str, args: &[String], timeout: Duration) -> ToolStatus {
  let run = Command::new(program)
    .args(args)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .output();

  let status = match tokio::time::timeout(timeout, run).await {
    Err(_) => ToolStatus::TimedOut,
    Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => ToolStatus::NotFound,
    Ok(Err(_)) => ToolStatus::Failed { code: None },
    Ok(Ok(out)) if out.status.success() => {
      let version = first_line(&out.stdout).or_else(|| first_line(&out.stderr)).unwrap_or_default();
      ToolStatus::Available { version }
    }
    Ok(Ok(out)) => ToolStatus::Failed { code: out.status.code() },
  };

  debug!(program, ?status, "tool probed");
  status
}

fn first_line(bytes: &[u8]) -> Option<String> {
  String::from_utf8_lossy(bytes).lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string)
}
