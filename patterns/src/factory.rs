use std::path::Path;
use std::path::PathBuf;

use crate::store::PatternStore;
use crate::store::yaml::YamlPatternStore;

#[cfg(feature = "sqlite")]
use crate::store::sqlite::SqlitePatternStore;

/// Backend selection for pattern persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Yaml,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Choose backend using env `MUR_PATTERN_BACKEND` if present: `sqlite` or `yaml`.
/// Defaults to YAML; if `sqlite` is requested but not compiled in, falls back to YAML.
pub fn choose_backend_from_env() -> Backend {
    let v = std::env::var("MUR_PATTERN_BACKEND").unwrap_or_default();
    match v.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" | "SQLITE" => Backend::Sqlite,
        "" | "yaml" | "YAML" => Backend::Yaml,
        other => {
            tracing::debug!("unsupported pattern backend {other:?}; using yaml");
            Backend::Yaml
        }
    }
}

/// Where and how patterns are stored. Unset fields resolve from the
/// environment, then from defaults under the home directory.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub backend: Option<Backend>,
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Pattern directory: explicit `dir`, else `MUR_PATTERNS_DIR`, else
    /// `~/.mur/patterns`.
    pub fn resolve_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        if let Ok(dir) = std::env::var("MUR_PATTERNS_DIR")
            && !dir.is_empty()
        {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(default_dir(&home))
    }

    pub fn resolve_backend(&self) -> Backend {
        self.backend.unwrap_or_else(choose_backend_from_env)
    }
}

pub fn default_dir(home: &Path) -> PathBuf {
    home.join(".mur").join("patterns")
}

/// Build the configured store.
/// - YAML: one file per pattern inside the pattern directory.
/// - SQLite: `MUR_PATTERNS_DB`, else `<dir>/patterns.db`.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<Box<dyn PatternStore>> {
    let dir = config.resolve_dir()?;
    let backend = config.resolve_backend();
    tracing::debug!(?backend, dir = %dir.display(), "opening pattern store");
    Ok(match backend {
        Backend::Yaml => Box::new(YamlPatternStore::new(dir)),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => {
            let path = std::env::var("MUR_PATTERNS_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| dir.join("patterns.db"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(SqlitePatternStore::new(path))
        }
    })
}
