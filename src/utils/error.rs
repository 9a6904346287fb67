use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Required tool '{tool}' is not available")]
    MissingToolError { tool: String, hint: String },

    #[error("Failed to start '{program}': {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Existence check for step '{step}' failed: `{command}`: {stderr}")]
    CheckFailedError {
        step: String,
        command: String,
        stderr: String,
    },

    #[error("Step '{step}' failed: `{command}` exited with {}: {stderr}", exit_code_label(.code))]
    CommandFailedError {
        step: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Health check against {url} failed: {message}")]
    HealthCheckError { url: String, message: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Interrupted by operator")]
    Interrupted,
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Prerequisite,
    ExternalTool,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LaunchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LaunchError::ConfigError { .. }
            | LaunchError::MissingConfigError { .. }
            | LaunchError::InvalidConfigValueError { .. }
            | LaunchError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            LaunchError::MissingToolError { .. } | LaunchError::SpawnError { .. } => {
                ErrorCategory::Prerequisite
            }
            LaunchError::CheckFailedError { .. } | LaunchError::CommandFailedError { .. } => {
                ErrorCategory::ExternalTool
            }
            LaunchError::HttpError(_) | LaunchError::HealthCheckError { .. } => {
                ErrorCategory::Network
            }
            LaunchError::IoError(_)
            | LaunchError::SerializationError(_)
            | LaunchError::ServerError { .. }
            | LaunchError::Interrupted => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LaunchError::HttpError(_) | LaunchError::HealthCheckError { .. } => {
                ErrorSeverity::Medium
            }
            LaunchError::Interrupted => ErrorSeverity::Medium,
            LaunchError::IoError(_) | LaunchError::ServerError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            LaunchError::ConfigError { .. }
            | LaunchError::MissingConfigError { .. }
            | LaunchError::InvalidConfigValueError { .. }
            | LaunchError::ConfigValidationError { .. } => {
                "Check the command-line flags or the plan file and try again".to_string()
            }
            LaunchError::MissingToolError { hint, .. } => hint.clone(),
            LaunchError::SpawnError { program, .. } => {
                format!("Make sure '{}' is installed and on your PATH", program)
            }
            LaunchError::CheckFailedError { .. } => {
                "Verify your AWS credentials and region, then re-run the plan".to_string()
            }
            LaunchError::CommandFailedError { .. } => {
                "Fix the error reported by the tool and re-run; steps that already completed will be skipped"
                    .to_string()
            }
            LaunchError::HttpError(_) | LaunchError::HealthCheckError { .. } => {
                "Make sure the service is deployed and reachable from this machine".to_string()
            }
            LaunchError::Interrupted => {
                "Re-run the plan; completed steps will be detected and skipped".to_string()
            }
            LaunchError::IoError(_)
            | LaunchError::SerializationError(_)
            | LaunchError::ServerError { .. } => {
                "Check file permissions and available system resources".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            LaunchError::MissingToolError { tool, .. } => {
                format!("'{}' was not found. It is required by this plan.", tool)
            }
            // stderr of the external tool is shown verbatim
            LaunchError::CommandFailedError { step, stderr, .. }
            | LaunchError::CheckFailedError { step, stderr, .. } => {
                format!("Step '{}' failed:\n{}", step, stderr)
            }
            other => other.to_string(),
        }
    }

    /// Exit code used by the binaries.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
