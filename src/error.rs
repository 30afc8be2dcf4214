use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Compile-time failure with the position it was detected at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Byte offset into the template source
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {} (offset {})",
            self.message, self.line, self.column, self.offset
        )
    }
}

/// Main error type for rustbars
#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(SyntaxError),

    #[error("Unknown helper: {0}")]
    UnknownHelper(String),

    #[error("Unknown partial: {0}")]
    UnknownPartial(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Helper '{helper}' argument mismatch: {message}")]
    HelperArgumentMismatch { helper: String, message: String },

    #[error("Helper '{helper}' failed: {message}")]
    Helper { helper: String, message: String },

    #[error("Helper already registered: {0}")]
    HelperAlreadyRegistered(String),

    #[error("Partial already registered: {0}")]
    PartialAlreadyRegistered(String),

    #[error("Partial '{name}' exceeded the nesting limit of {limit}")]
    PartialDepthExceeded { name: String, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Self::Syntax(err)
    }
}

impl Error {
    pub fn syntax(
        offset: usize,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Syntax(SyntaxError::new(offset, line, column, message))
    }

    pub fn unknown_helper(name: impl Into<String>) -> Self {
        Self::UnknownHelper(name.into())
    }

    pub fn unknown_partial(name: impl Into<String>) -> Self {
        Self::UnknownPartial(name.into())
    }

    pub fn argument_mismatch(helper: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HelperArgumentMismatch {
            helper: helper.into(),
            message: message.into(),
        }
    }

    pub fn helper(helper: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            helper: helper.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context layers
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for compile-time errors
    pub fn is_syntax(&self) -> bool {
        matches!(self.root(), Self::Syntax(_))
    }

    /// True for errors raised while evaluating a compiled template
    pub fn is_render(&self) -> bool {
        matches!(
            self.root(),
            Self::UnknownHelper(_)
                | Self::UnknownPartial(_)
                | Self::UnknownTemplate(_)
                | Self::HelperArgumentMismatch { .. }
                | Self::Helper { .. }
                | Self::PartialDepthExceeded { .. }
        )
    }

    /// True for duplicate-name registrations
    pub fn is_registration_conflict(&self) -> bool {
        matches!(
            self.root(),
            Self::HelperAlreadyRegistered(_) | Self::PartialAlreadyRegistered(_)
        )
    }
}
