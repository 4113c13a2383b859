//! The skein interpreter.
//!
//! [`Interpreter`] is the host-facing entry point: it owns the root scope,
//! runs scripts in async or sync mode, calls script functions on behalf of
//! the host, and exposes abort/pause control.

use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use skein_ast::{Node, NodeKind};

use crate::engine::{drive, Engine, Mode, DEFAULT_MAX_CALL_DEPTH};
use crate::error::{Error, ErrorKind};
use crate::irq::{Irq, IrqSleep};
use crate::lifecycle::Handler;
use crate::native::{BoxFuture, NativeFn};
use crate::scope::{LogEvent, LogSink, Scope, Variable};
use crate::stdlib;
use crate::value::Value;
use crate::Result;

/// Answers a `readline` prompt.
pub type InputCallback = Rc<dyn Fn(String) -> BoxFuture<'static, String>>;
/// Receives everything the script prints.
pub type OutputCallback = Rc<dyn Fn(Value)>;
/// Receives errors that escape a top-level execution.
pub type ErrorCallback = Rc<dyn Fn(Error)>;

/// Host configuration for an [`Interpreter`].
///
/// Every callback is optional. Without an error callback, errors are
/// returned to the caller instead.
#[derive(Clone, Default)]
pub struct InterpreterOptions {
    input: Option<InputCallback>,
    output: Option<OutputCallback>,
    error: Option<ErrorCallback>,
    log: Option<LogSink>,
    max_step: Option<u64>,
    max_call_depth: Option<usize>,
    abort_on_error: bool,
    irq_rate: Option<f64>,
    irq_sleep: Option<IrqSleep>,
}

impl InterpreterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + 'static,
        Fut: Future<Output = String> + 'static,
    {
        self.input = Some(Rc::new(move |prompt: String| -> BoxFuture<'static, String> {
            Box::pin(f(prompt))
        }));
        self
    }

    pub fn output(mut self, f: impl Fn(Value) + 'static) -> Self {
        self.output = Some(Rc::new(f));
        self
    }

    pub fn error(mut self, f: impl Fn(Error) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }

    /// Diagnostic events: `block:*`, `var:*` and `end`.
    pub fn log(mut self, f: impl Fn(&str, &LogEvent) + 'static) -> Self {
        self.log = Some(Rc::new(f));
        self
    }

    /// Fail with "max step exceeded" after this many evaluation steps.
    /// Zero means no limit.
    pub fn max_step(mut self, max_step: u64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Fail once function calls nest deeper than this. Zero means no limit.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    /// Abort the interpreter the first time an error reaches the error
    /// callback.
    pub fn abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.abort_on_error = abort_on_error;
        self
    }

    /// Yield every `rate` steps during async execution. Zero disables.
    pub fn irq_rate(mut self, rate: f64) -> Self {
        self.irq_rate = Some(rate);
        self
    }

    pub fn irq_sleep(mut self, sleep: IrqSleep) -> Self {
        self.irq_sleep = Some(sleep);
        self
    }
}

/// `print` and `readline`, wired to the host callbacks.
fn io_library(opts: &InterpreterOptions) -> HashMap<String, Variable> {
    let output = opts.output.clone();
    let print = Value::native("print", move |args, _| {
        let value = args.first().cloned().ok_or(ErrorKind::ExpectedAny)?;
        if let Some(output) = &output {
            output(value);
        }
        Ok(Value::Null)
    });

    let input = opts.input.clone();
    let readline = Value::native_fn(
        "readline",
        NativeFn::new_async(move |args, _| {
            let input = input.clone();
            async move {
                let prompt = args.first().ok_or(ErrorKind::ExpectedAny)?.as_str()?.to_string();
                let answer = match input {
                    Some(input) => Value::Str(input(prompt).await),
                    None => Value::Null,
                };
                Ok::<_, Error>(answer)
            }
        }),
    );

    HashMap::from([
        ("print".to_string(), Variable::constant(print)),
        ("readline".to_string(), Variable::constant(readline)),
    ])
}

/// A script interpreter bound to one root scope.
pub struct Interpreter {
    engine: Rc<Engine>,
}

impl Interpreter {
    /// Create an interpreter whose root scope holds `consts`, the built-in
    /// library and the I/O functions. Built-ins win over constants of the
    /// same name.
    pub fn new(consts: HashMap<String, Value>, opts: InterpreterOptions) -> Result<Self> {
        let irq = Irq::new(opts.irq_rate, opts.irq_sleep.clone())?;
        let mut bindings: HashMap<String, Variable> = consts
            .into_iter()
            .map(|(name, value)| (name, Variable::constant(value)))
            .collect();
        bindings.extend(stdlib::library());
        bindings.extend(io_library(&opts));
        tracing::debug!(bindings = bindings.len(), "creating interpreter");

        let root = Scope::root(bindings, opts.log.clone());
        let engine = Engine::new(
            root,
            irq,
            opts.max_step,
            opts.max_call_depth.unwrap_or(DEFAULT_MAX_CALL_DEPTH),
            opts.abort_on_error,
            opts.error,
            opts.log,
        );
        Ok(Self {
            engine: Rc::new(engine),
        })
    }

    /// The root scope.
    pub fn scope(&self) -> &Rc<Scope> {
        &self.engine.root
    }

    /// Number of evaluation steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.engine.step_count()
    }

    /// Run a script cooperatively.
    ///
    /// Returns `None` for an empty script, or when an error was handed to
    /// the error callback.
    pub async fn exec(&self, script: &[Node]) -> Result<Option<Value>> {
        if script.is_empty() {
            return Ok(None);
        }
        match self.engine.exec_program(script, Mode::Async).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.engine.handle_error(e)?;
                Ok(None)
            }
        }
    }

    /// Run a script to completion without ever suspending. Errors are
    /// returned directly, bypassing the error callback.
    pub fn exec_sync(&self, script: &[Node]) -> Result<Option<Value>> {
        if script.is_empty() {
            return Ok(None);
        }
        drive(self.engine.exec_program(script, Mode::Sync)).map(Some)
    }

    /// Call a script function from the host. When an error callback is set,
    /// failures are reported there and the call yields `func_failed`.
    pub async fn exec_fn(&self, f: &Value, args: Vec<Value>) -> Result<Value> {
        self.engine.exec_fn(f, args, Mode::Async).await
    }

    pub fn exec_fn_sync(&self, f: &Value, args: Vec<Value>) -> Result<Value> {
        self.engine.exec_fn_sync(f, args)
    }

    /// Call a script function, always returning errors to the caller.
    pub async fn exec_fn_simple(&self, f: &Value, args: Vec<Value>) -> Result<Value> {
        self.engine.exec_fn_simple(f, args, Mode::Async).await
    }

    /// Stop all evaluation. Running code winds down returning `null`.
    pub fn abort(&self) {
        self.engine.lifecycle.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.engine.lifecycle.is_stopped()
    }

    /// Suspend async evaluation at the next node until [`Interpreter::unpause`].
    pub fn pause(&self) {
        self.engine.lifecycle.pause();
    }

    pub fn unpause(&self) {
        self.engine.lifecycle.unpause();
    }

    pub fn is_paused(&self) -> bool {
        self.engine.lifecycle.is_paused()
    }

    pub fn register_abort_handler(&self, handler: Handler) {
        self.engine.lifecycle.abort_handlers.register(handler);
    }

    pub fn unregister_abort_handler(&self, handler: &Handler) {
        self.engine.lifecycle.abort_handlers.unregister(handler);
    }

    pub fn register_pause_handler(&self, handler: Handler) {
        self.engine.lifecycle.pause_handlers.register(handler);
    }

    pub fn unregister_pause_handler(&self, handler: &Handler) {
        self.engine.lifecycle.pause_handlers.unregister(handler);
    }

    pub fn register_unpause_handler(&self, handler: Handler) {
        self.engine.lifecycle.unpause_handlers.register(handler);
    }

    pub fn unregister_unpause_handler(&self, handler: &Handler) {
        self.engine.lifecycle.unpause_handlers.unregister(handler);
    }

    /// Gather the top-level metadata blocks of a script, keyed by block name.
    ///
    /// Returns `None` for an empty script.
    pub fn collect_metadata(script: &[Node]) -> Result<Option<HashMap<Option<String>, JsonValue>>> {
        if script.is_empty() {
            return Ok(None);
        }
        let mut meta = HashMap::new();
        for node in script {
            if let NodeKind::Meta { name, value } = &node.kind {
                meta.insert(name.clone(), literal_to_json(value)?);
            }
        }
        Ok(Some(meta))
    }
}

/// Metadata values must be literals.
fn literal_to_json(node: &Node) -> Result<JsonValue> {
    match &node.kind {
        NodeKind::Null => Ok(JsonValue::Null),
        NodeKind::Bool { value } => Ok(JsonValue::Bool(*value)),
        NodeKind::Num { value } => Ok(serde_json::Number::from_f64(*value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        NodeKind::Str { value } => Ok(JsonValue::String(value.clone())),
        NodeKind::Arr { value } => value
            .iter()
            .map(literal_to_json)
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        NodeKind::Obj { value } => {
            let mut obj = serde_json::Map::new();
            for (key, item) in value {
                obj.insert(key.clone(), literal_to_json(item)?);
            }
            Ok(JsonValue::Object(obj))
        }
        other => Err(Error::hostside(format!("Unexpected node in metadata: {}", other.name())).at(node.loc.start)),
    }
}
