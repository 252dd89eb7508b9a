use thiserror::Error;

/// Checklist appended to every connectivity failure against a query service.
pub const CONNECTIVITY_CHECKLIST: &str = "Please check:\n\
    1. Is the Dremio server running?\n\
    2. Is the URL correct? (should be like http://hostname:9047)\n\
    3. Are you able to ping the host?\n\
    4. Is port 9047 open and accessible?";

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BenchError {
    /// Transport failures worth another attempt at the request layer.
    pub fn is_transient(&self) -> bool {
        matches!(self, BenchError::Timeout(_) | BenchError::Connection(_))
    }

    /// Classify a reqwest failure into the crate taxonomy.
    pub fn from_transport(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BenchError::Timeout(format!("{}: {}", context, err))
        } else if err.is_connect() || err.is_request() {
            BenchError::Connection(format!("{}: {}", context, err))
        } else if let Some(status) = err.status() {
            BenchError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            BenchError::Protocol(format!("{}: {}", context, err))
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BenchError::Timeout("x".into()).is_transient());
        assert!(BenchError::Connection("x".into()).is_transient());
        assert!(!BenchError::Http { status: 500, body: String::new() }.is_transient());
        assert!(!BenchError::Authentication("bad".into()).is_transient());
    }
}
