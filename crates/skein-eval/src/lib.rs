//! skein interpreter.
//!
//! A tree-walking interpreter for the skein scripting language. Scripts
//! arrive as syntax trees from `skein-ast` and can be run either
//! cooperatively on an async runtime or strictly synchronously; both modes
//! share one set of evaluation rules.

mod control;
mod engine;
pub mod error;
mod eval;
pub mod interpreter;
pub mod irq;
pub mod lifecycle;
mod namespace;
pub mod native;
mod prim;
mod reference;
pub mod scope;
pub mod stdlib;
pub mod value;

pub use control::Control;
pub use engine::{CallInfo, Mode, DEFAULT_MAX_CALL_DEPTH};
pub use error::{Error, ErrorKind};
pub use interpreter::{Interpreter, InterpreterOptions};
pub use irq::IrqSleep;
pub use lifecycle::Handler;
pub use native::{BoxFuture, NativeContext, NativeFn, NativeReturn};
pub use scope::{LogEvent, Scope, Variable};
pub use value::{Attr, Function, Shared, Value};

/// Result type for skein evaluation.
pub type Result<T> = std::result::Result<T, Error>;
