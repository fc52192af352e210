use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use remix_core::ports::{SeparatedStems, SeparationError, StemSeparator};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::SeparatorConfig;

/// Últimos bytes de stderr que se conservan en el error.
const STDERR_TAIL_BYTES: usize = 2048;

/// Motor de separación externo con la convención de salida de Demucs.
///
/// La plantilla `--filename` fija la salida en `<output_root>/<model>/<job>/<pista>.<ext>`,
/// así que el nombre de la entrada no interviene en la ruta de los artefactos.
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
  cfg: SeparatorConfig,
}

impl DemucsSeparator {
  pub fn new(cfg: SeparatorConfig) -> Self {
    Self { cfg }
  }

  /// Directorio de artefactos del modelo; es la raíz que escanean limpieza y diagnósticos.
  pub fn model_dir(&self, output_root: &Path) -> PathBuf {
    output_root.join(&self.cfg.model)
  }

  /// Dónde deja el motor las pistas del trabajo `job`.
  fn expected_dir(&self, job: &str, output_root: &Path) -> PathBuf {
    self.model_dir(output_root).join(job)
  }

  fn command(&self, input: &Path, output_root: &Path, job: &str) -> Command {
    let mut cmd = Command::new(&self.cfg.program);
    cmd
      .args(&self.cfg.leading_args)
      .arg("-n")
      .arg(&self.cfg.model)
      .arg("-o")
      .arg(output_root)
      .arg("--filename")
      .arg(format!("{job}/{{stem}}.{}", self.cfg.stem_ext))
      .arg(input)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    cmd
  }
}

#[async_trait]
impl StemSeparator for DemucsSeparator {
  async fn separate(&self, input: &Path, output_root: &Path, job: &str) -> Result<SeparatedStems, SeparationError> {
    if !tokio::fs::try_exists(input).await.unwrap_or(false) {
      return Err(SeparationError::InputMissing(input.to_path_buf()));
    }
    if job.is_empty() || job.contains(['/', '\\']) || job == ".." {
      return Err(SeparationError::Io(format!("invalid job name {job:?}")));
    }

    tokio::fs::create_dir_all(output_root)
      .await
      .map_err(|e| SeparationError::Io(format!("{}: {e}", output_root.display())))?;

    debug!(program = %self.cfg.program, model = %self.cfg.model, job, input = %input.display(), "spawning engine");

    let output = self
      .command(input, output_root, job)
      .output()
      .await
      .map_err(|e| SeparationError::Spawn(format!("{}: {e}", self.cfg.program)))?;

    if !output.status.success() {
      return Err(SeparationError::ExitStatus { code: output.status.code(), stderr: stderr_tail(&output.stderr) });
    }

    let output_dir = self.expected_dir(job, output_root);
    if !output_dir.is_dir() {
      return Err(SeparationError::MissingOutputDir(output_dir));
    }

    let artifacts: Vec<(String, PathBuf)> = self
      .cfg
      .stem_names
      .iter()
      .map(|name| (name.clone(), output_dir.join(format!("{name}.{}", self.cfg.stem_ext))))
      .collect();

    for (name, path) in &artifacts {
      if !path.is_file() {
        warn!(name = %name, path = %path.display(), "engine finished without producing stem");
      }
    }

    Ok(SeparatedStems { output_dir, artifacts })
  }
}

fn stderr_tail(stderr: &[u8]) -> String {
  let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
  String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
