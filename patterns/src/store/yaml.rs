use super::*;

use anyhow::Context as _;
use std::path::Path;
use std::path::PathBuf;

use crate::error::PatternError;
use crate::error::validate_name;

/// Directory of `<name>.yaml` files, one pattern per file.
#[derive(Debug, Clone)]
pub struct YamlPatternStore {
    dir: PathBuf,
}

impl YamlPatternStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.yaml"))
    }

    fn read(&self, path: &Path) -> anyhow::Result<Pattern> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read pattern {}", path.display()))?;
        serde_yaml::from_str(&data).with_context(|| format!("parse pattern {}", path.display()))
    }

    fn write(&self, pattern: &Pattern) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create pattern dir {}", self.dir.display()))?;
        let path = self.path_for(&pattern.name);
        let data = serde_yaml::to_string(pattern)?;
        std::fs::write(&path, data).with_context(|| format!("write pattern {}", path.display()))
    }
}

impl PatternStore for YamlPatternStore {
    fn list(&self) -> anyhow::Result<Vec<Pattern>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("list patterns in {}", self.dir.display())));
            }
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("read pattern {}", path.display()))?;
            match serde_yaml::from_str::<Pattern>(&data) {
                Ok(p) => out.push(p),
                Err(e) => tracing::debug!("skipping unparseable pattern {}: {e}", path.display()),
            }
        }
        Ok(out)
    }

    fn get(&self, name: &str) -> anyhow::Result<Option<Pattern>> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    fn add(&self, pattern: Pattern) -> anyhow::Result<Pattern> {
        validate_name(&pattern.name)?;
        if self.path_for(&pattern.name).exists() {
            return Err(PatternError::AlreadyExists(pattern.name).into());
        }
        let pattern = prepare_new(pattern, Utc::now());
        self.write(&pattern)?;
        Ok(pattern)
    }

    fn update(&self, pattern: &Pattern) -> anyhow::Result<()> {
        let Some(existing) = self.get(&pattern.name)? else {
            return Err(PatternError::NotFound(pattern.name.clone()).into());
        };
        self.write(&prepare_update(&existing, pattern, Utc::now()))
    }

    fn delete(&self, name: &str) -> anyhow::Result<()> {
        validate_name(name)?;
        let path = self.path_for(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PatternError::NotFound(name.to_string()).into())
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("delete {}", path.display()))),
        }
    }
}
