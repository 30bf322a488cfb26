//! Error types for launch_composer

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a launch file into a [`LaunchDescription`].
///
/// [`LaunchDescription`]: crate::description::LaunchDescription
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required attribute '{attribute}' on element '<{element}>'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Type coercion failed for attribute '{attribute}' with value '{value}' (expected {expected_type})")]
    TypeCoercion {
        attribute: String,
        value: String,
        expected_type: &'static str,
    },

    #[error("Unexpected element '<{child}>' in '<{parent}>'")]
    UnexpectedElement { parent: String, child: String },

    #[error("Invalid substitution syntax: {0}")]
    InvalidSubstitution(String),

    #[error("Element '<{element}>' cannot have both '{first}' and '{second}'")]
    ConflictingAttributes {
        element: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Unsupported launch file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstitutionError {
    #[error("Unbound argument: '{0}'. Declare it with a default or pass it as {0}:=<value>")]
    UnboundArgument(String),

    #[error(
        "Undefined environment variable: '{0}'. Make sure the variable is set in your environment."
    )]
    UndefinedEnvVar(String),

    #[error("Package '{0}' not found. Ensure the package is installed and sourced.")]
    PackageNotFound(String),

    #[error("Invalid substitution: {0}")]
    InvalidSubstitution(String),
}

/// Errors that abort composition. Nothing is started when one of these is returned.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("{source} (in {scope})")]
    Substitution {
        #[source]
        source: SubstitutionError,
        scope: String,
    },

    #[error("Resource not found: {resource} (in {scope})")]
    ResourceNotFound { resource: String, scope: String },

    #[error("Failed to load launch description {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Condition value '{value}' is not a boolean (in {scope})")]
    InvalidCondition { value: String, scope: String },

    #[error("Argument '{name}' has value '{value}', expected one of [{}] (in {scope})", .choices.join(", "))]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
        scope: String,
    },

    #[error("Include cycle detected: {} is already being included (in {scope})", .path.display())]
    IncludeCycle { path: PathBuf, scope: String },

    #[error("Include depth limit of {limit} exceeded (in {scope})")]
    IncludeDepthExceeded { limit: usize, scope: String },
}

impl ComposeError {
    /// Attach scope to a substitution failure. Missing packages become
    /// [`ComposeError::ResourceNotFound`].
    pub fn from_substitution(err: SubstitutionError, scope: impl Into<String>) -> Self {
        match err {
            SubstitutionError::PackageNotFound(package) => ComposeError::ResourceNotFound {
                resource: format!("package '{}'", package),
                scope: scope.into(),
            },
            source => ComposeError::Substitution {
                source,
                scope: scope.into(),
            },
        }
    }

    /// Name of the unbound argument, if this error is an unbound-argument failure.
    pub fn unbound_argument(&self) -> Option<&str> {
        match self {
            ComposeError::Substitution {
                source: SubstitutionError::UnboundArgument(name),
                ..
            } => Some(name),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn process '{name}': {source}")]
    ProcessStart {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ParseError>;
