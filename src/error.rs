use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Everything that can stop a collection run or a chart render.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("{0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Access(String),

    #[error("GraphQL query failed: {0}")]
    Graph(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response from GitHub: {0}")]
    Decode(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load data: {0}")]
    Load(String),
}

impl From<reqwest::Error> for MetricsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MetricsError::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            MetricsError::Decode(err.to_string())
        } else {
            MetricsError::Network(err.to_string())
        }
    }
}
