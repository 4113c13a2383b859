//! Host-provided functions.
//!
//! A native function has a general form, which may hand back a future, and
//! an optional synchronous form. Async execution always calls the general
//! form; sync execution prefers the synchronous form and rejects a general
//! form that turns out to be pending.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::engine::{drive, Cx, Engine, Frame, Mode};
use crate::lifecycle::Handler;
use crate::value::{Function, Value};
use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// What the general form of a native function hands back.
pub enum NativeReturn {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value>>),
}

type GeneralForm = dyn Fn(&[Value], &NativeContext) -> Result<NativeReturn>;
type SyncForm = dyn Fn(&[Value], &NativeContext) -> Result<Value>;

#[derive(Clone)]
pub struct NativeFn {
    pub(crate) general: Rc<GeneralForm>,
    pub(crate) sync_form: Option<Rc<SyncForm>>,
}

impl NativeFn {
    /// A native that always answers immediately.
    pub fn new(f: impl Fn(&[Value], &NativeContext) -> Result<Value> + 'static) -> Self {
        Self {
            general: Rc::new(move |args: &[Value], ctx: &NativeContext| f(args, ctx).map(NativeReturn::Ready)),
            sync_form: None,
        }
    }

    /// A native whose result arrives later. Only usable from async execution
    /// unless a synchronous form is added with [`NativeFn::with_sync`].
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>, NativeContext) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        Self {
            general: Rc::new(move |args: &[Value], ctx: &NativeContext| {
                Ok(NativeReturn::Pending(Box::pin(f(args.to_vec(), ctx.clone()))))
            }),
            sync_form: None,
        }
    }

    /// A native with a general form that may suspend.
    pub fn from_general(f: impl Fn(&[Value], &NativeContext) -> Result<NativeReturn> + 'static) -> Self {
        Self {
            general: Rc::new(f),
            sync_form: None,
        }
    }

    pub fn with_sync(mut self, f: impl Fn(&[Value], &NativeContext) -> Result<Value> + 'static) -> Self {
        self.sync_form = Some(Rc::new(f));
        self
    }
}

impl Value {
    /// Wrap a synchronous closure as a function value.
    pub fn native(name: &str, f: impl Fn(&[Value], &NativeContext) -> Result<Value> + 'static) -> Self {
        Value::Fn(Rc::new(Function::native(name, NativeFn::new(f))))
    }

    /// Wrap an async closure as a function value.
    pub fn native_async<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(Vec<Value>, NativeContext) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        Value::Fn(Rc::new(Function::native(name, NativeFn::new_async(f))))
    }

    pub fn native_fn(name: &str, native: NativeFn) -> Self {
        Value::Fn(Rc::new(Function::native(name, native)))
    }
}

/// Handle given to a native function for calling back into the interpreter.
#[derive(Clone)]
pub struct NativeContext {
    engine: Rc<Engine>,
    stack: Rc<Frame>,
    mode: Mode,
}

impl NativeContext {
    pub(crate) fn new(engine: Rc<Engine>, stack: Rc<Frame>, mode: Mode) -> Self {
        Self { engine, stack, mode }
    }

    /// The mode of the execution that invoked this native.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Call a script function from within the current call chain.
    pub fn call(&self, f: &Value, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let ctx = self.clone();
        let f = f.clone();
        Box::pin(async move {
            let f = f.as_fn()?.clone();
            let cx = Cx {
                stack: Some(&ctx.stack),
                mode: ctx.mode,
            };
            ctx.engine.call_fn(&f, args, cx, None).await
        })
    }

    /// Call a script function to completion without suspending.
    pub fn call_sync(&self, f: &Value, args: Vec<Value>) -> Result<Value> {
        let f = f.as_fn()?;
        let cx = Cx {
            stack: Some(&self.stack),
            mode: Mode::Sync,
        };
        drive(self.engine.call_fn(f, args, cx, None))
    }

    /// Call a function as a fresh top-level entry point, with errors routed to
    /// the host error callback.
    pub fn top_call(&self, f: &Value, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let engine = self.engine.clone();
        let f = f.clone();
        Box::pin(async move { engine.exec_fn(&f, args, Mode::Async).await })
    }

    pub fn top_call_sync(&self, f: &Value, args: Vec<Value>) -> Result<Value> {
        self.engine.exec_fn_sync(f, args)
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
}
