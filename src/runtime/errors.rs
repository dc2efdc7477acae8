//! Runtime error model.
//!
//! Everything the engine surfaces to a user is an [`AuraError`]: one of six
//! [`ErrorKind`]s plus a message and optional source context. Low-level
//! faults (a divide by zero, a missing name) are classified into an
//! `AuraError` exactly once, at the innermost statement boundary, by
//! [`safe_execute`]. Above that boundary only `AuraError` travels, so no raw
//! host-level failure ever reaches the user.
//!
//! Messages are written for beginners in plain words, never as a stack trace.

use std::error::Error;
use std::fmt;

/// The six user-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Variable,
    Math,
    Loop,
    Function,
    Memory,
    Runtime,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Variable => "Variable Error",
            ErrorKind::Math => "Math Error",
            ErrorKind::Loop => "Loop Error",
            ErrorKind::Function => "Function Error",
            ErrorKind::Memory => "Memory Error",
            ErrorKind::Runtime => "Runtime Error",
        }
    }
}

/// Where an error happened, for user-facing formatting.
///
/// Every field is optional: context is attached opportunistically as an error
/// propagates, and formatting skips whatever is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub line_number: Option<usize>,
    pub file_path: Option<String>,
    pub function_name: Option<String>,
    pub code_line: Option<String>,
}

impl ErrorContext {
    pub fn at_line(line: usize) -> Self {
        ErrorContext {
            line_number: Some(line),
            ..ErrorContext::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line_number.is_none()
            && self.file_path.is_none()
            && self.function_name.is_none()
            && self.code_line.is_none()
    }
}

/// A classified runtime error: kind, message, and optional context.
#[derive(Debug, Clone, PartialEq)]
pub struct AuraError {
    kind: ErrorKind,
    message: String,
    context: ErrorContext,
}

impl AuraError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AuraError {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn variable(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Variable, message)
    }

    pub fn math(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Math, message)
    }

    pub fn loop_error(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Loop, message)
    }

    pub fn function(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Function, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Memory, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        AuraError::new(ErrorKind::Runtime, message)
    }

    /// Attaches context, replacing whatever was there.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Fills in context fields that are still empty, keeping existing ones.
    /// Used when an error bubbles up through a frame that knows more than the
    /// site that raised it.
    pub fn or_context(mut self, context: &ErrorContext) -> Self {
        if self.context.line_number.is_none() {
            self.context.line_number = context.line_number;
        }
        if self.context.file_path.is_none() {
            self.context.file_path = context.file_path.clone();
        }
        if self.context.function_name.is_none() {
            self.context.function_name = context.function_name.clone();
        }
        if self.context.code_line.is_none() {
            self.context.code_line = context.code_line.clone();
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

impl fmt::Display for AuraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        if let Some(line) = self.context.line_number {
            write!(f, "\n  Line: {}", line)?;
        }
        if let Some(path) = &self.context.file_path {
            write!(f, "\n  File: {}", path)?;
        }
        if let Some(function) = &self.context.function_name {
            write!(f, "\n  In: {}", function)?;
        }
        if let Some(code) = &self.context.code_line {
            write!(f, "\n  Code: {}", code)?;
        }
        Ok(())
    }
}

impl Error for AuraError {}

/// A raw fault produced by execution plumbing before classification.
///
/// These mirror the ways a statement can actually fail at the host level.
/// [`Fault::into_error`] maps each one onto the user-facing [`ErrorKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    NameNotFound(String),
    DivideByZero,
    RecursionOverflow,
    OutOfMemory,
    InvalidType(String),
    InvalidValue(String),
    Other(String),
}

impl Fault {
    /// Classifies this fault into an [`AuraError`], attaching `context`.
    pub fn into_error(self, context: ErrorContext) -> AuraError {
        let error = match self {
            Fault::NameNotFound(name) => {
                AuraError::variable(format!("Unknown variable or function: {}", name))
            }
            Fault::DivideByZero => AuraError::math("Cannot divide by zero"),
            Fault::RecursionOverflow => {
                AuraError::function("Too many nested function calls")
            }
            Fault::OutOfMemory => AuraError::memory("Out of memory"),
            Fault::InvalidType(detail) => {
                AuraError::math(format!("Invalid operation: {}", detail))
            }
            Fault::InvalidValue(detail) => {
                AuraError::math(format!("Invalid value: {}", detail))
            }
            Fault::Other(detail) => AuraError::runtime(format!("Unexpected error: {}", detail)),
        };
        error.with_context(context)
    }
}

/// Either an already-classified error or a raw fault.
///
/// Execution internals return `Result<T, Failure>` so that `?` works across
/// both shapes; [`safe_execute`] collapses the distinction at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Error(AuraError),
    Fault(Fault),
}

impl From<AuraError> for Failure {
    fn from(error: AuraError) -> Self {
        Failure::Error(error)
    }
}

impl From<Fault> for Failure {
    fn from(fault: Fault) -> Self {
        Failure::Fault(fault)
    }
}

/// Runs `f`, classifying any raw fault it surfaces.
///
/// An [`AuraError`] passes through with its original context intact (missing
/// fields are filled from `context`); a [`Fault`] is converted here. This is
/// the only place conversion happens, so wrapping an already-wrapped unit of
/// work never double-classifies.
pub fn safe_execute<T, F>(context: ErrorContext, f: F) -> Result<T, AuraError>
where
    F: FnOnce() -> Result<T, Failure>,
{
    f().map_err(|failure| match failure {
        Failure::Error(error) => error.or_context(&context),
        Failure::Fault(fault) => fault.into_error(context),
    })
}
