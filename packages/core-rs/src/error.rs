//! Failure taxonomy for the session workflow and the artifact fetches.
//!
//! Every failure keeps the category it was raised in, so a view can tell a
//! rejected URL apart from an unreachable service or an explicit server-side
//! failure.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The remote operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Submit,
    Clone,
    Analyze,
    Endpoints,
    Flows,
    Entities,
    SchemaOverview,
    Swagger,
    Features,
    Diagram,
    MarkdownExport,
}

impl Operation {
    /// Label used as the prefix of user-visible messages.
    pub fn label(self) -> &'static str {
        match self {
            Operation::Submit => "Error submitting repository",
            Operation::Clone => "Error cloning repository",
            Operation::Analyze => "Error analyzing project",
            Operation::Endpoints => "Error parsing endpoints",
            Operation::Flows => "Error loading endpoint flow data",
            Operation::Entities => "Error loading entities",
            Operation::SchemaOverview => "Error loading schema data",
            Operation::Swagger => "Error loading Swagger spec",
            Operation::Features => "Error loading feature files",
            Operation::Diagram => "Error generating diagram",
            Operation::MarkdownExport => "Error exporting markdown",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Application,
    PartialEnrichment,
    Config,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input rejected locally; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// No response was received.
    #[error("{operation}: no response from server ({message})")]
    Transport { operation: Operation, message: String },

    /// The server answered and reported a failure.
    #[error("{operation}: {message}")]
    Application { operation: Operation, message: String },

    /// An optional stage failed after the earlier stages succeeded.
    #[error("{operation}: {message}")]
    PartialEnrichment { operation: Operation, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(operation: Operation, msg: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: msg.into(),
        }
    }

    pub fn application(operation: Operation, msg: impl Into<String>) -> Self {
        Self::Application {
            operation,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_) => ErrorKind::Validation,
            SessionError::Transport { .. } => ErrorKind::Transport,
            SessionError::Application { .. } => ErrorKind::Application,
            SessionError::PartialEnrichment { .. } => ErrorKind::PartialEnrichment,
            SessionError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            SessionError::Transport { operation, .. }
            | SessionError::Application { operation, .. }
            | SessionError::PartialEnrichment { operation, .. } => Some(*operation),
            SessionError::Validation(_) | SessionError::Config(_) => None,
        }
    }

    /// The most specific detail available, without the operation prefix.
    pub fn detail(&self) -> &str {
        match self {
            SessionError::Validation(message) | SessionError::Config(message) => message,
            SessionError::Transport { message, .. }
            | SessionError::Application { message, .. }
            | SessionError::PartialEnrichment { message, .. } => message,
        }
    }

    /// Demote a stage failure to a warning that sits next to a usable snapshot.
    pub fn into_enrichment_warning(self, fallback: Operation) -> Self {
        let operation = self.operation().unwrap_or(fallback);
        let message = match self {
            SessionError::Validation(message)
            | SessionError::Config(message)
            | SessionError::Transport { message, .. }
            | SessionError::Application { message, .. }
            | SessionError::PartialEnrichment { message, .. } => message,
        };
        Self::PartialEnrichment { operation, message }
    }
}

impl Serialize for SessionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SessionError", 4)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("operation", &self.operation())?;
        state.serialize_field("detail", self.detail())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}
