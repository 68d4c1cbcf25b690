/// Errors surfaced by the pattern engine.
///
/// Integrity and injection findings are reported as values, never through
/// this type. Only store failures and bad addressing end up here.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    #[error("invalid pattern name {0:?}: use 1-64 letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("pattern not found: {0}")]
    NotFound(String),

    #[error("pattern already exists: {0}")]
    AlreadyExists(String),
}

/// Store backends report through `anyhow`; recover our own variants when a
/// backend raised one, everything else means the store is unusable.
impl From<anyhow::Error> for PatternError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PatternError>() {
            Ok(own) => own,
            Err(other) => PatternError::StoreUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatternError>;

/// Names double as file names: non-empty, at most 64 chars of `[A-Za-z0-9_-]`.
pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PatternError::InvalidName(name.to_string()))
    }
}
