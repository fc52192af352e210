use crate::paths::ConfigError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item};

/// Acceso por secciones a un archivo TOML.
pub trait ConfigBackend {
  fn load_section<T: DeserializeOwned>(&self, section: &str) -> Result<T, ConfigError>;
  fn save_section<T: Serialize>(&self, section: &str, value: &T) -> Result<(), ConfigError>;
}

pub struct TomlConfigBackend {
  path: PathBuf,
}

impl TomlConfigBackend {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Tabla raíz del archivo, o `None` si el archivo no existe.
  fn read_table(&self) -> Result<Option<toml::Table>, ConfigError> {
    match std::fs::read_to_string(&self.path) {
      Ok(content) => Ok(Some(toml::from_str(&content)?)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// Como `load_section`, pero un archivo o sección ausente da `T::default()`.
  ///
  /// Las claves ausentes dentro de la sección también caen a su default si `T`
  /// usa `#[serde(default)]`.
  pub fn load_section_with_default<T>(&self, section: &str) -> Result<T, ConfigError>
  where
    T: DeserializeOwned + Default,
  {
    let Some(mut table) = self.read_table()? else {
      return Ok(T::default());
    };
    match table.remove(section) {
      Some(value) => decode(section, value),
      None => Ok(T::default()),
    }
  }
}

fn decode<T: DeserializeOwned>(section: &str, value: toml::Value) -> Result<T, ConfigError> {
  value.try_into().map_err(|e| ConfigError::Section { section: section.to_string(), message: e.to_string() })
}

impl ConfigBackend for TomlConfigBackend {
  fn load_section<T: DeserializeOwned>(&self, section: &str) -> Result<T, ConfigError> {
    let mut table = self
      .read_table()?
      .ok_or_else(|| ConfigError::Other(format!("config file {} not found", self.path.display())))?;

    let value = table
      .remove(section)
      .ok_or_else(|| ConfigError::Other(format!("missing section [{section}] in {}", self.path.display())))?;

    decode(section, value)
  }

  /// Reescribe solo `[section]`; el resto del documento y sus comentarios se conservan.
  fn save_section<T: Serialize>(&self, section: &str, value: &T) -> Result<(), ConfigError> {
    let mut doc: DocumentMut = match std::fs::read_to_string(&self.path) {
      Ok(content) => {
        content.parse::<DocumentMut>().map_err(|e| ConfigError::Other(format!("parse toml_edit doc: {e}")))?
      }
      Err(e) if e.kind() == ErrorKind::NotFound => DocumentMut::new(),
      Err(e) => return Err(e.into()),
    };

    let encoded = toml::to_string(value)
      .map_err(|e| ConfigError::Section { section: section.to_string(), message: e.to_string() })?;

    // `encoded` es una tabla sin cabecera ("a = 1\nb = 2\n").
    let item: Item = encoded
      .parse::<DocumentMut>()
      .map_err(|e| ConfigError::Other(format!("parse section as doc: {e}")))?
      .into_item();

    doc[section] = item;

    remix_fs::atomic_write_str(&self.path, &doc.to_string())?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use tempfile::tempdir;

  #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
  #[serde(default)]
  struct Sample {
    name: String,
    retries: u32,
  }

  #[test]
  fn missing_file_or_section_gives_default() {
    let dir = tempdir().unwrap();
    let backend = TomlConfigBackend::new(dir.path().join("remix.toml"));
    assert_eq!(backend.load_section_with_default::<Sample>("sample").unwrap(), Sample::default());

    std::fs::write(backend.path(), "[other]\nx = 1\n").unwrap();
    assert_eq!(backend.load_section_with_default::<Sample>("sample").unwrap(), Sample::default());
    assert!(backend.load_section::<Sample>("sample").is_err());
  }

  #[test]
  fn save_section_keeps_other_sections_and_comments() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("remix.toml");
    std::fs::write(&path, "# mantener\n[other]\nx = 1 # inline\n").unwrap();

    let backend = TomlConfigBackend::new(&path);
    let value = Sample { name: "demucs".into(), retries: 3 };
    backend.save_section("sample", &value).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("# mantener"));
    assert!(text.contains("# inline"));
    assert_eq!(backend.load_section::<Sample>("sample").unwrap(), value);
  }

  #[test]
  fn partial_section_fills_missing_keys() {
    let dir = tempdir().unwrap();
    let backend = TomlConfigBackend::new(dir.path().join("remix.toml"));
    std::fs::write(backend.path(), "[sample]\nretries = 5\n").unwrap();

    let loaded: Sample = backend.load_section_with_default("sample").unwrap();
    assert_eq!(loaded, Sample { name: String::new(), retries: 5 });
  }

  #[test]
  fn wrong_type_is_a_section_error() {
    let dir = tempdir().unwrap();
    let backend = TomlConfigBackend::new(dir.path().join("remix.toml"));
    std::fs::write(backend.path(), "[sample]\nretries = \"many\"\n").unwrap();

    let err = backend.load_section_with_default::<Sample>("sample").unwrap_err();
    assert!(matches!(err, ConfigError::Section { .. }));
  }
}
