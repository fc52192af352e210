use std::path::Path;

use crate::domain::ContentId;

/// Port que calcula la identidad de contenido de un archivo.
///
/// Debe ser determinista y leer por bloques acotados: el uso de memoria no
/// depende del tamaño del archivo.
#[async_trait::async_trait]
pub trait Fingerprinter: Send + Sync {
  async fn fingerprint(&self, path: &Path) -> std::io::Result<ContentId>;
}
