use crate::runtime::value::ValueType;

/// Everything that can go wrong while loading, running or saving a story.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoryError {
    /// Malformed or unrecognised JSON shape.
    #[error("format error: {0}")]
    Format(String),
    #[error("{kind} version {found} is not supported (this engine reads {minimum} to {current})")]
    IncompatibleVersion {
        kind: &'static str,
        found: i64,
        minimum: u32,
        current: u32,
    },
    #[error("addressing error: {0}")]
    Addressing(String),
    #[error("stack discipline error: {0}")]
    StackDiscipline(String),
    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: ValueType, to: ValueType },
    #[error("type error: {0}")]
    Type(String),
    #[error("choice index {index} is out of range ({count} choices available)")]
    InvalidChoice { index: usize, count: usize },
    #[error("{0}")]
    Runtime(String),
    /// A fatal error raised while stepping, tagged with where it happened.
    #[error("RUNTIME ERROR: {location}: {error}")]
    Located {
        location: String,
        error: Box<StoryError>,
    },
}

impl StoryError {
    pub fn format(message: impl Into<String>) -> Self {
        StoryError::Format(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        StoryError::Runtime(message.into())
    }

    pub fn stack(message: impl Into<String>) -> Self {
        StoryError::StackDiscipline(message.into())
    }

    /// The underlying error with any location wrapper removed.
    pub fn root_cause(&self) -> &StoryError {
        match self {
            StoryError::Located { error, .. } => error.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for StoryError {
    fn from(err: serde_json::Error) -> Self {
        StoryError::Format(err.to_string())
    }
}
