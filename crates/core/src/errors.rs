use std::path::PathBuf;

/// Result type alias for ciglue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ciglue operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors: empty command lists, empty path sets,
    /// malformed matchers. Always fatal, reported before any work starts.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Fingerprint computation errors (missing input path, unreadable tree)
    #[error("failed to hash '{path}': {message}")]
    Hashing { path: PathBuf, message: String },

    /// Cache backend errors. These are always recoverable: a failed restore
    /// is a miss, a failed save is dropped.
    #[error("cache backend {operation} failed: {message}")]
    CacheBackend { operation: String, message: String },

    /// Command execution errors
    #[error("{}", format_command_error(.command, .args, .message, .exit_code))]
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    /// A test report file that could not be parsed
    #[error("failed to parse report '{path}': {message}")]
    ReportParse { path: String, message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Network-related errors
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },
}

fn format_command_error(
    command: &str,
    args: &[String],
    message: &str,
    exit_code: &Option<i32>,
) -> String {
    let args_str = args.join(" ");
    match exit_code {
        Some(code) => {
            if args_str.is_empty() {
                format!("command '{command}' failed with exit code {code}: {message}")
            } else {
                format!("command '{command} {args_str}' failed with exit code {code}: {message}")
            }
        }
        None => {
            if args_str.is_empty() {
                format!("command '{command}' failed: {message}")
            } else {
                format!("command '{command} {args_str}' failed: {message}")
            }
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a hashing error
    pub fn hashing(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Hashing {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cache backend error
    pub fn cache_backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CacheBackend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a command execution error
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
            exit_code,
        }
    }

    /// Create a report parse error
    pub fn report_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ReportParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether the error is a recoverable cache backend failure
    #[must_use]
    pub fn is_cache_backend(&self) -> bool {
        matches!(self, Error::CacheBackend { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}
