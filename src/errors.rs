use std::{fmt, path::PathBuf};

use color_eyre::Report;

/// Crate-wide result type, defaulting to [`AppError`]
pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Top-level error type for the application.
///
/// Distinguishes conditions the user can act upon from unexpected failures
/// that should be reported as bugs.
#[derive(Debug)]
pub enum AppError {
    /// An error with a clear, actionable message for the end user
    UserFacing(UserFacingError),
    /// Any other unexpected error
    Unexpected(Report),
}

/// Errors with a clear meaning to the end user
#[derive(Debug, thiserror::Error)]
pub enum UserFacingError {
    /// The given path doesn't exist or can't be used for the operation
    #[error("path does not exist or is not accessible: {}", .0.display())]
    InvalidPath(PathBuf),
    /// A configuration key was requested that is neither present nor has a default
    #[error("unknown configuration key '{0}'")]
    ConfigKey(String),
    /// The configured provider name is not one of the supported backends
    #[error("unknown provider '{0}', expected 'anthropic' or 'ollama'")]
    UnknownProvider(String),
    /// A config file already exists at the target path
    #[error("configuration file already exists at {}, use --force to overwrite", .0.display())]
    AlreadyInitialized(PathBuf),
    /// The scaffold target directory already exists
    #[error("directory already exists: {}, use --force to overwrite", .0.display())]
    ProjectExists(PathBuf),
    /// The provider rejected the credentials, or none were configured
    #[error("provider authentication failed: {0}")]
    ProviderAuth(String),
    /// The provider rate-limited the request
    #[error("the provider rate-limited the request, try again later")]
    ProviderRateLimit,
    /// The provider couldn't be reached, including a local server not running
    #[error("provider request failed: {0}")]
    ProviderNetwork(String),
    /// The provider answered with a body that couldn't be understood
    #[error("malformed provider response: {0}")]
    ProviderMalformedResponse(String),
    /// The Jira API reported a failure
    #[error("jira: {0}")]
    Jira(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UserFacing(err) => err.fmt(f),
            AppError::Unexpected(report) => report.fmt(f),
        }
    }
}

impl From<UserFacingError> for AppError {
    fn from(err: UserFacingError) -> Self {
        AppError::UserFacing(err)
    }
}

impl From<Report> for AppError {
    fn from(report: Report) -> Self {
        AppError::Unexpected(report)
    }
}
