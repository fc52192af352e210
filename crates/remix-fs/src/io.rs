use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Escritura atómica: archivo temporal hermano + `rename`.
///
/// Un crash a mitad deja, como mucho, un `.tmp` huérfano; nunca un destino truncado.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
  let tmp_path = tmp_sibling(path);

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent)?;
  }

  let written = (|| {
    let mut tmp_file = fs::File::create(&tmp_path)?;
    tmp_file.write_all(contents)?;
    tmp_file.sync_all()?;
    fs::rename(&tmp_path, path)
  })();

  if written.is_err() {
    let _ = fs::remove_file(&tmp_path);
    return written;
  }

  sync_parent(path);
  Ok(())
}

pub fn atomic_write_str(path: &Path, contents: &str) -> io::Result<()> {
  atomic_write(path, contents.as_bytes())
}

fn tmp_sibling(path: &Path) -> PathBuf {
  let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
  // Sin esto el rename puede perderse en un corte de luz.
  if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    if let Ok(d) = fs::File::open(dir) {
      let _ = d.sync_all();
    }
  }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}
