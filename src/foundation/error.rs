pub type SkelxflResult<T> = Result<T, SkelxflError>;

#[derive(thiserror::Error, Debug)]
pub enum SkelxflError {
    /// Malformed or truncated binary bundle input. Carries the section being
    /// decoded and the byte offset within it at which decoding failed.
    #[error("format error in {section} section at offset {offset}: {reason}")]
    Format {
        section: &'static str,
        offset: usize,
        reason: String,
    },

    /// Malformed external timeline document.
    #[error("schema error at {path}: {reason}")]
    Schema { path: String, reason: String },

    /// Internal invariant violation. Indicates a bug in the converter, not a
    /// problem with user input.
    #[error("build error: {0}")]
    Build(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkelxflError {
    pub fn format(section: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            section,
            offset,
            reason: reason.into(),
        }
    }

    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
