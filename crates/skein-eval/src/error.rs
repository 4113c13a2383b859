//! Runtime errors raised while evaluating a script.
//!
//! Errors are plain data: the dispatcher attaches the source position of the
//! innermost failing node and a formatted call-stack trace on the way out.

use skein_ast::Pos;
use thiserror::Error;

use crate::value::Value;

/// What went wrong.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("Expect {expected}, but got {actual}.")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Expect anything, but got nothing.")]
    ExpectedAny,

    #[error("Index out of range. index: {index} max: {max}")]
    IndexOutOfRange { index: f64, max: i64 },

    #[error("Cannot read prop ({prop}) of {target}.")]
    CannotReadProp { prop: String, target: &'static str },

    #[error("No such property '{name}' on {target}.")]
    NoSuchProp { name: String, target: &'static str },

    #[error("No such variable '{name}' in scope '{scope}'")]
    UnknownIdentifier { name: String, scope: String },

    #[error("Cannot assign to an immutable variable {0}.")]
    AssignToImmutable(String),

    #[error("Variable '{name}' already exists in scope '{scope}'")]
    AlreadyDefined { name: String, scope: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(&'static str),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Namespace(String),

    #[error("max step exceeded")]
    MaxStepExceeded,

    #[error("max call depth exceeded ({0})")]
    CallDepthExceeded(usize),

    #[error("{0}")]
    Hostside(String),

    #[error("{0}")]
    Native(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A runtime error with its location and call-stack trace.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}{}", .trace.iter().map(|line| format!("\n{}", line)).collect::<String>())]
pub struct Error {
    pub kind: ErrorKind,
    /// Start of the innermost node that was being evaluated.
    pub pos: Option<Pos>,
    /// `  at name (Line L, Column C)` lines, innermost first.
    pub trace: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            pos: None,
            trace: Vec::new(),
        }
    }

    pub fn type_mismatch(expected: &'static str, actual: &Value) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected,
            actual: actual.type_name(),
        })
    }

    pub fn namespace(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Namespace(message.into()))
    }

    pub fn hostside(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hostside(message.into()))
    }

    /// Error raised by a host-supplied native function.
    pub fn native(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Native(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Attach a position unless one is already known.
    pub fn at(mut self, pos: Pos) -> Self {
        self.pos.get_or_insert(pos);
        self
    }

    /// Errors that end the whole execution rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::MaxStepExceeded | ErrorKind::Hostside(_))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}
