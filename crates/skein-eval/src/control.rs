//! Non-local control flow.
//!
//! `return`, `break` and `continue` travel up the evaluator as the error arm
//! of [`Flow`], next to runtime errors, so `?` propagates both.

use crate::error::{Error, ErrorKind};
use crate::value::Value;
use crate::Result;

/// A pending `return`, `break` or `continue`.
#[derive(Debug, Clone)]
pub enum Control {
    Return(Value),
    Break {
        label: Option<String>,
        value: Option<Value>,
    },
    Continue {
        label: Option<String>,
    },
}

impl Control {
    pub fn kind(&self) -> &'static str {
        match self {
            Control::Return(_) => "return",
            Control::Break { .. } => "break",
            Control::Continue { .. } => "continue",
        }
    }
}

/// Why evaluation of a node stopped early.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Control(Control),
    Error(Error),
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Interrupt::Error(e)
    }
}

impl From<ErrorKind> for Interrupt {
    fn from(kind: ErrorKind) -> Self {
        Interrupt::Error(kind.into())
    }
}

impl From<Control> for Interrupt {
    fn from(control: Control) -> Self {
        Interrupt::Control(control)
    }
}

/// Result of evaluating one node.
pub(crate) type Flow = std::result::Result<Value, Interrupt>;

/// Require a plain value where a control signal has nowhere to go.
pub(crate) fn expect_value(flow: Flow) -> Result<Value> {
    match flow {
        Ok(v) => Ok(v),
        Err(Interrupt::Error(e)) => Err(e),
        Err(Interrupt::Control(control)) => Err(Error::internal(format!(
            "Unexpected {} outside of a function or loop",
            control.kind()
        ))),
    }
}

/// A labeled construct consumes a `break` carrying its own label.
pub(crate) fn unwrap_labeled_break(flow: Flow, label: Option<&str>) -> Flow {
    match flow {
        Err(Interrupt::Control(Control::Break {
            label: Some(target),
            value,
        })) if label == Some(target.as_str()) => Ok(value.unwrap_or(Value::Null)),
        other => other,
    }
}

/// What a loop does after one iteration.
pub(crate) enum LoopStep {
    Next,
    Exit,
    Propagate(Interrupt),
}

/// Unlabeled signals and signals carrying the loop's own label belong to the
/// loop; anything else keeps travelling outward.
pub(crate) fn loop_step(flow: Flow, label: Option<&str>) -> LoopStep {
    let ours = |target: &Option<String>| target.is_none() || target.as_deref() == label;
    match flow {
        Ok(_) => LoopStep::Next,
        Err(Interrupt::Control(Control::Break { label: target, .. })) if ours(&target) => LoopStep::Exit,
        Err(Interrupt::Control(Control::Continue { label: target })) if ours(&target) => LoopStep::Next,
        Err(other) => LoopStep::Propagate(other),
    }
}
