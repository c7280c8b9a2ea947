use thiserror::Error;

#[derive(Error, Debug)]
pub enum JenkinsError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("{operation} failed with HTTP status {status}")]
    Api { operation: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl JenkinsError {
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn api(operation: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::Api {
            operation: operation.into(),
            status: status.as_u16(),
        }
    }

    /// Transport failures are the only errors worth retrying inside a poll loop.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, JenkinsError>;
