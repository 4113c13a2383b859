//! The evaluation core shared by async and sync execution.
//!
//! There is a single evaluator, written as async code. Async execution awaits
//! it on the host's runtime. Sync execution runs the same code in
//! [`Mode::Sync`], where nothing is allowed to suspend, and drives it with one
//! poll. Both modes therefore share every evaluation rule.

use std::cell::Cell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use skein_ast::{Node, NodeKind, Pos};

use crate::control::{expect_value, Control, Flow, Interrupt};
use crate::error::{Error, ErrorKind};
use crate::interpreter::ErrorCallback;
use crate::irq::Irq;
use crate::lifecycle::Lifecycle;
use crate::native::{BoxFuture, NativeContext, NativeFn, NativeReturn};
use crate::scope::{LogEvent, LogSink, Scope};
use crate::value::{FnBody, Function, Value};
use crate::Result;

/// Which execution strategy is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cooperative: honours pause and periodically yields.
    Async,
    /// Run to completion: never suspends, ignores pause and yielding.
    Sync,
}

/// One frame of the script-level call stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub name: String,
    /// Position of the call site.
    pub pos: Option<Pos>,
}

/// Default ceiling on nested function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2048;

/// Stack space to keep free before polling a nested evaluation.
const RED_ZONE: usize = 128 * 1024;

/// Size of each extra stack segment.
const STACK_SEGMENT: usize = 1024 * 1024;

/// A call frame linked to its caller's frame.
pub(crate) struct Frame {
    info: CallInfo,
    caller: Option<Rc<Frame>>,
    depth: usize,
}

impl Frame {
    pub(crate) fn push(caller: Option<&Rc<Frame>>, info: CallInfo) -> Rc<Frame> {
        Rc::new(Frame {
            info,
            caller: caller.cloned(),
            depth: caller.map_or(0, |c| c.depth) + 1,
        })
    }
}

/// Frames from the outermost call to the innermost.
fn frames(stack: Option<&Rc<Frame>>) -> Vec<&CallInfo> {
    let mut out = Vec::new();
    let mut frame = stack;
    while let Some(f) = frame {
        out.push(&f.info);
        frame = f.caller.as_ref();
    }
    out.reverse();
    out
}

/// Per-evaluation context threaded through every evaluator.
#[derive(Clone, Copy)]
pub(crate) struct Cx<'a> {
    pub stack: Option<&'a Rc<Frame>>,
    pub mode: Mode,
}

impl Cx<'_> {
    pub fn top(mode: Mode) -> Self {
        Cx { stack: None, mode }
    }

    pub fn depth(&self) -> usize {
        self.stack.map_or(0, |f| f.depth)
    }
}

/// Polls an evaluation on a stack that grows on demand, so deeply nested
/// scripts do not overflow the host thread.
struct StackSafe<'a, T>(BoxFuture<'a, T>);

impl<'a, T> StackSafe<'a, T> {
    fn new(fut: impl Future<Output = T> + 'a) -> Self {
        StackSafe(Box::pin(fut))
    }
}

impl<T> Future for StackSafe<'_, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.0.as_mut().poll(cx))
    }
}

pub(crate) struct Engine {
    pub(crate) root: Rc<Scope>,
    pub(crate) lifecycle: Lifecycle,
    irq: Irq,
    max_step: Option<u64>,
    max_call_depth: usize,
    abort_on_error: bool,
    on_error: Option<ErrorCallback>,
    log: Option<LogSink>,
    step_count: Cell<u64>,
}

impl Engine {
    pub fn new(
        root: Rc<Scope>,
        irq: Irq,
        max_step: Option<u64>,
        max_call_depth: usize,
        abort_on_error: bool,
        on_error: Option<ErrorCallback>,
        log: Option<LogSink>,
    ) -> Self {
        Self {
            root,
            lifecycle: Lifecycle::default(),
            irq,
            max_step,
            max_call_depth,
            abort_on_error,
            on_error,
            log,
            step_count: Cell::new(0),
        }
    }

    pub fn step_count(&self) -> u64 {
        self.step_count.get()
    }

    pub(crate) fn log(&self, event: &str, payload: impl FnOnce() -> LogEvent) {
        tracing::trace!(event, "interpreter event");
        if let Some(sink) = &self.log {
            sink(event, &payload());
        }
    }

    pub(crate) fn log_scope(&self, event: &str, scope: &Scope, val: Option<&Value>) {
        self.log(event, || LogEvent {
            scope: Some(scope.name().to_string()),
            var: None,
            val: val.cloned(),
        });
    }

    /// Evaluate one node, attaching position and trace to errors raised
    /// beneath it.
    pub(crate) fn eval<'a>(
        self: &'a Rc<Self>,
        node: &'a Node,
        scope: &'a Rc<Scope>,
        cx: Cx<'a>,
    ) -> BoxFuture<'a, Flow> {
        Box::pin(StackSafe::new(async move {
            match self.eval_gated(node, scope, cx).await {
                Err(Interrupt::Error(e)) => Err(Interrupt::Error(locate(e, node, cx.stack))),
                other => other,
            }
        }))
    }

    async fn eval_gated(self: &Rc<Self>, node: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        if self.lifecycle.is_stopped() {
            return Ok(Value::Null);
        }
        if cx.mode == Mode::Async {
            self.lifecycle.wait_unpaused().await;
            self.irq.sleep_if_due(self.step_count.get()).await;
        }
        self.step()?;
        self.dispatch(node, scope, cx).await
    }

    fn step(&self) -> Result<()> {
        let count = self.step_count.get() + 1;
        self.step_count.set(count);
        match self.max_step {
            Some(max) if max > 0 && count > max => Err(ErrorKind::MaxStepExceeded.into()),
            _ => Ok(()),
        }
    }

    async fn dispatch(self: &Rc<Self>, node: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        match &node.kind {
            NodeKind::Call { target, args } => Box::pin(self.eval_call(node, target, args, scope, cx)).await,
            NodeKind::If {
                label,
                cond,
                then,
                elseif,
                otherwise,
            } => {
                Box::pin(self.eval_if(label.as_deref(), cond, then, elseif, otherwise.as_deref(), scope, cx))
                    .await
            }
            NodeKind::Match {
                label,
                about,
                qs,
                default,
            } => Box::pin(self.eval_match(label.as_deref(), about, qs, default.as_deref(), scope, cx)).await,
            NodeKind::Loop { label, statements } => Box::pin(self.eval_loop(label.as_deref(), statements, scope, cx)).await,
            NodeKind::For { label, spec, body } => Box::pin(self.eval_for(label.as_deref(), spec, body, scope, cx)).await,
            NodeKind::Each {
                label,
                var,
                items,
                body,
            } => Box::pin(self.eval_each(label.as_deref(), var, items, body, scope, cx)).await,
            NodeKind::Def {
                dest,
                expr,
                mutable,
                attr,
            } => Box::pin(self.eval_def(dest, expr, *mutable, attr, scope, cx)).await,
            NodeKind::Identifier { name } => Ok(scope.get(name)?),
            NodeKind::Assign { dest, expr } => Box::pin(self.eval_assign(dest, expr, scope, cx)).await,
            NodeKind::AddAssign { dest, expr } => Box::pin(self.eval_compound_assign(dest, expr, 1.0, scope, cx)).await,
            NodeKind::SubAssign { dest, expr } => Box::pin(self.eval_compound_assign(dest, expr, -1.0, scope, cx)).await,
            NodeKind::Null => Ok(Value::Null),
            NodeKind::Bool { value } => Ok(Value::Bool(*value)),
            NodeKind::Num { value } => Ok(Value::Num(*value)),
            NodeKind::Str { value } => Ok(Value::Str(value.clone())),
            NodeKind::Arr { value } => Box::pin(self.eval_arr(value, scope, cx)).await,
            NodeKind::Obj { value } => Box::pin(self.eval_obj(value, scope, cx)).await,
            NodeKind::Tmpl { tmpl } => Box::pin(self.eval_tmpl(tmpl, scope, cx)).await,
            NodeKind::Exists { identifier } => Ok(Value::Bool(scope.exists(identifier))),
            NodeKind::Prop { target, name } => Box::pin(self.eval_prop(target, name, scope, cx)).await,
            NodeKind::Index { target, index } => Box::pin(self.eval_index(target, index, scope, cx)).await,
            NodeKind::Not { expr } => {
                let v = self.eval(expr, scope, cx).await?;
                Ok(Value::Bool(!v.as_bool()?))
            }
            NodeKind::Plus { expr } => {
                let v = self.eval(expr, scope, cx).await?;
                Ok(Value::Num(v.as_num()?))
            }
            NodeKind::Minus { expr } => {
                let v = self.eval(expr, scope, cx).await?;
                Ok(Value::Num(-v.as_num()?))
            }
            NodeKind::Fn(def) => Box::pin(self.eval_fn(def, scope, cx)).await,
            NodeKind::Block { label, statements } => Box::pin(self.eval_block(label.as_deref(), statements, scope, cx)).await,
            NodeKind::Return { expr } => {
                let v = self.eval(expr, scope, cx).await?;
                self.log_scope("block:return", scope, Some(&v));
                Err(Control::Return(v).into())
            }
            NodeKind::Break { label, expr } => {
                let value = match expr {
                    Some(expr) => Some(self.eval(expr, scope, cx).await?),
                    None => None,
                };
                self.log_scope("block:break", scope, None);
                Err(Control::Break {
                    label: label.clone(),
                    value,
                }
                .into())
            }
            NodeKind::Continue { label } => {
                self.log_scope("block:continue", scope, None);
                Err(Control::Continue { label: label.clone() }.into())
            }
            NodeKind::And { left, right } => Box::pin(self.eval_and(left, right, scope, cx)).await,
            NodeKind::Or { left, right } => Box::pin(self.eval_or(left, right, scope, cx)).await,
            NodeKind::Pow { left, right } => Box::pin(self.eval_binary_operation("Core:pow", left, right, scope, cx)).await,
            NodeKind::Mul { left, right } => Box::pin(self.eval_binary_operation("Core:mul", left, right, scope, cx)).await,
            NodeKind::Div { left, right } => Box::pin(self.eval_binary_operation("Core:div", left, right, scope, cx)).await,
            NodeKind::Rem { left, right } => Box::pin(self.eval_binary_operation("Core:mod", left, right, scope, cx)).await,
            NodeKind::Add { left, right } => Box::pin(self.eval_binary_operation("Core:add", left, right, scope, cx)).await,
            NodeKind::Sub { left, right } => Box::pin(self.eval_binary_operation("Core:sub", left, right, scope, cx)).await,
            NodeKind::Lt { left, right } => Box::pin(self.eval_binary_operation("Core:lt", left, right, scope, cx)).await,
            NodeKind::Lteq { left, right } => Box::pin(self.eval_binary_operation("Core:lteq", left, right, scope, cx)).await,
            NodeKind::Gt { left, right } => Box::pin(self.eval_binary_operation("Core:gt", left, right, scope, cx)).await,
            NodeKind::Gteq { left, right } => Box::pin(self.eval_binary_operation("Core:gteq", left, right, scope, cx)).await,
            NodeKind::Eq { left, right } => Box::pin(self.eval_binary_operation("Core:eq", left, right, scope, cx)).await,
            NodeKind::Neq { left, right } => Box::pin(self.eval_binary_operation("Core:neq", left, right, scope, cx)).await,
            // Collected before the run; nothing left to do when reached.
            NodeKind::Ns { .. } | NodeKind::Meta { .. } => Ok(Value::Null),
            NodeKind::NamedTypeSource | NodeKind::FnTypeSource | NodeKind::UnionTypeSource | NodeKind::Attr => {
                Err(Error::internal(format!("invalid node type: {}", node.kind.name())).into())
            }
        }
    }

    /// Evaluate statements in order. The value of the last one is the result.
    pub(crate) async fn run(self: &Rc<Self>, program: &[Node], scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        self.log_scope("block:enter", scope, None);
        let mut last = Value::Null;
        for node in program {
            match self.eval(node, scope, cx).await {
                Ok(v) => last = v,
                Err(Interrupt::Control(control)) => {
                    let val = match &control {
                        Control::Return(v) => Some(v),
                        _ => None,
                    };
                    self.log_scope(&format!("block:{}", control.kind()), scope, val);
                    return Err(control.into());
                }
                Err(e) => return Err(e),
            }
        }
        self.log_scope("block:leave", scope, Some(&last));
        Ok(last)
    }

    /// Evaluate a clause body; statement bodies get a scope of their own.
    pub(crate) async fn eval_clause(self: &Rc<Self>, node: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        if node.is_statement() {
            let child = scope.create_child_scope(HashMap::new());
            self.eval(node, &child, cx).await
        } else {
            self.eval(node, scope, cx).await
        }
    }

    /// Apply a built-in operator by looking its implementation up in scope.
    async fn eval_binary_operation(
        self: &Rc<Self>,
        op: &str,
        left: &Node,
        right: &Node,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let callee = scope.get(op)?;
        let f = callee.as_fn()?;
        let l = self.eval(left, scope, cx).await?;
        let r = self.eval(right, scope, cx).await?;
        Ok(self.call_fn(f, vec![l, r], cx, None).await?)
    }

    /// Invoke a function value. `pos` is the call site, if there is one.
    pub(crate) fn call_fn<'a>(
        self: &'a Rc<Self>,
        f: &'a Rc<Function>,
        args: Vec<Value>,
        cx: Cx<'a>,
        pos: Option<Pos>,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match &f.body {
                FnBody::Native(native) => self.call_native(native, args, cx, pos).await,
                FnBody::User { def, defaults, scope } => {
                    if self.max_call_depth > 0 && cx.depth() >= self.max_call_depth {
                        return Err(ErrorKind::CallDepthExceeded(self.max_call_depth).into());
                    }
                    let fn_scope = scope.create_child_scope(HashMap::new());
                    for (i, param) in def.params.iter().enumerate() {
                        let arg = match (args.get(i), &defaults[i]) {
                            (Some(arg), _) => arg.clone(),
                            (None, Some(default)) => default.clone(),
                            (None, None) => return Err(ErrorKind::ExpectedAny.into()),
                        };
                        crate::eval::define(&fn_scope, &param.dest, arg, true)?;
                    }
                    let frame = Frame::push(
                        cx.stack,
                        CallInfo {
                            name: f.name().unwrap_or_else(|| "<anonymous>".to_string()),
                            pos,
                        },
                    );
                    let inner = Cx {
                        stack: Some(&frame),
                        mode: cx.mode,
                    };
                    match self.run(&def.children, &fn_scope, inner).await {
                        Ok(v) | Err(Interrupt::Control(Control::Return(v))) => Ok(v),
                        Err(Interrupt::Control(control)) => Err(Error::internal(format!(
                            "{} escaped a function body",
                            control.kind()
                        ))),
                        Err(Interrupt::Error(e)) => Err(e),
                    }
                }
            }
        })
    }

    async fn call_native(
        self: &Rc<Self>,
        native: &NativeFn,
        args: Vec<Value>,
        cx: Cx<'_>,
        pos: Option<Pos>,
    ) -> Result<Value> {
        let stack = Frame::push(
            cx.stack,
            CallInfo {
                name: "<native>".to_string(),
                pos,
            },
        );
        if cx.mode == Mode::Sync {
            if let Some(sync_form) = &native.sync_form {
                let ctx = NativeContext::new(self.clone(), stack, Mode::Sync);
                return sync_form(&args, &ctx);
            }
        }
        let ctx = NativeContext::new(self.clone(), stack, Mode::Async);
        match (native.general)(&args, &ctx)? {
            NativeReturn::Ready(v) => Ok(v),
            NativeReturn::Pending(_) if cx.mode == Mode::Sync => Err(Error::hostside(
                "Native function must not return a pending result in sync mode.",
            )),
            NativeReturn::Pending(fut) => fut.await,
        }
    }

    /// Collect namespaces, then run a whole script at the root scope.
    pub(crate) async fn exec_program(self: &Rc<Self>, script: &[Node], mode: Mode) -> Result<Value> {
        let root = self.root.clone();
        self.collect_ns(script, &root, mode).await?;
        let result = expect_value(self.run(script, &root, Cx::top(mode)).await)?;
        self.log("end", || LogEvent {
            val: Some(result.clone()),
            ..Default::default()
        });
        Ok(result)
    }

    /// Call a function as a top-level entry point. Errors go to the host
    /// error callback when there is one, and the call yields a
    /// `func_failed` error value instead.
    pub(crate) async fn exec_fn(self: &Rc<Self>, f: &Value, args: Vec<Value>, mode: Mode) -> Result<Value> {
        match self.exec_fn_simple(f, args, mode).await {
            Ok(v) => Ok(v),
            Err(e) => {
                self.handle_error(e)?;
                Ok(Value::error("func_failed", None))
            }
        }
    }

    pub(crate) async fn exec_fn_simple(self: &Rc<Self>, f: &Value, args: Vec<Value>, mode: Mode) -> Result<Value> {
        let f = f.as_fn()?;
        self.call_fn(f, args, Cx::top(mode), None).await
    }

    pub(crate) fn exec_fn_sync(self: &Rc<Self>, f: &Value, args: Vec<Value>) -> Result<Value> {
        drive(self.exec_fn(f, args, Mode::Sync))
    }

    /// Route an error to the host callback, or hand it back when the host did
    /// not install one.
    pub(crate) fn handle_error(&self, e: Error) -> Result<()> {
        let Some(on_error) = &self.on_error else {
            return Err(e);
        };
        if self.abort_on_error {
            if self.lifecycle.is_stopped() {
                return Ok(());
            }
            self.lifecycle.abort();
        }
        tracing::warn!(error = %e, "script error");
        on_error(e);
        Ok(())
    }
}

/// Attach the node's position and the call-stack trace to an error that
/// does not have a position yet.
fn locate(mut e: Error, node: &Node, stack: Option<&Rc<Frame>>) -> Error {
    if e.pos.is_some() {
        return e;
    }
    let stack = frames(stack);
    let pos = node.loc.start;
    e.pos = Some(pos);
    let positions = stack.iter().map(|frame| frame.pos).chain(std::iter::once(Some(pos)));
    let mut trace: Vec<String> = positions
        .enumerate()
        .map(|(i, pos)| {
            let name = if i == 0 { "<root>" } else { stack[i - 1].name.as_str() };
            match pos {
                Some(p) => format!("  at {} (Line {}, Column {})", name, p.line, p.column),
                None => format!("  at {}", name),
            }
        })
        .collect();
    trace.reverse();
    e.trace = trace;
    e
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Run a sync-mode evaluation to completion with a single poll.
pub(crate) fn drive<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    let waker = Waker::from(Arc::new(NoopWake));
    let mut context = Context::from_waker(&waker);
    let mut fut = std::pin::pin!(fut);
    match fut.as_mut().poll(&mut context) {
        Poll::Ready(result) => result,
        Poll::Pending => Err(Error::hostside(
            "Synchronous execution cannot wait for a pending operation.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(caller: Option<&Rc<Frame>>, name: &str, pos: Option<Pos>) -> Rc<Frame> {
        Frame::push(
            caller,
            CallInfo {
                name: name.into(),
                pos,
            },
        )
    }

    #[test]
    fn test_locate_builds_innermost_first_trace() {
        let node = Node::at(NodeKind::Null, 3, 7);
        let outer = frame(None, "outer", Some(Pos::new(10, 1)));
        let inner = frame(Some(&outer), "inner", Some(Pos::new(5, 2)));
        assert_eq!(inner.depth, 2);
        let err = locate(Error::native("boom"), &node, Some(&inner));
        assert_eq!(err.pos, Some(Pos::new(3, 7)));
        assert_eq!(
            err.trace,
            vec![
                "  at inner (Line 3, Column 7)",
                "  at outer (Line 5, Column 2)",
                "  at <root> (Line 10, Column 1)",
            ]
        );
    }

    #[test]
    fn test_locate_keeps_existing_position() {
        let node = Node::at(NodeKind::Null, 3, 7);
        let err = locate(Error::native("boom").at(Pos::new(1, 1)), &node, None);
        assert_eq!(err.pos, Some(Pos::new(1, 1)));
        assert!(err.trace.is_empty());
    }

    #[test]
    fn test_native_frames_without_position() {
        let node = Node::at(NodeKind::Null, 2, 2);
        let native = frame(None, "<native>", None);
        let err = locate(Error::native("boom"), &node, Some(&native));
        assert_eq!(err.trace, vec!["  at <native> (Line 2, Column 2)", "  at <root>"]);
    }

    #[test]
    fn test_drive_rejects_pending() {
        let err = drive(async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Hostside(_)));
        assert_eq!(drive(async { Ok(1) }).unwrap(), 1);
    }
}
