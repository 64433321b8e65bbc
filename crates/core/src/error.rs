use thiserror::Error;

#[derive(Debug, Error)]
pub enum LyraError {
    #[error("invalid birth date '{0}', expected YYYY-MM-DD")]
    InvalidBirthDate(String),

    #[error("invalid birth time '{0}', expected HH:MM")]
    InvalidBirthTime(String),

    #[error("unknown intent label '{0}'")]
    UnknownIntent(String),

    #[error("unknown persona label '{0}'")]
    UnknownPersona(String),

    #[error("invalid pattern for intent '{intent}': {source}")]
    InvalidPattern {
        intent: String,
        #[source]
        source: regex::Error,
    },

    #[error("malformed definition file: {0}")]
    MalformedDefinition(#[from] serde_json::Error),
}

pub type LyraResult<T> = Result<T, LyraError>;
