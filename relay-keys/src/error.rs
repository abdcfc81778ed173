use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeyError>;

#[derive(Debug, Error)]
pub enum KeyError {
    /// No source yielded a key. Carries the environment variable that would
    /// satisfy the lookup so the message is actionable.
    #[error(
        "no API key for {service}: pass one directly, add it to a keys file, or set the {env_var} environment variable"
    )]
    NotFound { service: String, env_var: String },

    #[error("keys file io error: {0}")]
    Io(String),

    #[error("keys file parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for KeyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
