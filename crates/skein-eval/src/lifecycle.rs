//! Abort, pause and resume.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::sync::watch;

/// Callback fired on a lifecycle transition.
pub type Handler = Rc<dyn Fn()>;

/// Handlers waiting for one kind of transition. Each fires at most once.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RefCell<Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn register(&self, handler: Handler) {
        self.handlers.borrow_mut().push(handler);
    }

    /// Remove every registration of this exact handler.
    pub fn unregister(&self, handler: &Handler) {
        self.handlers.borrow_mut().retain(|h| !Rc::ptr_eq(h, handler));
    }

    /// Fire all handlers in registration order and forget them.
    pub fn fire_and_clear(&self) {
        let handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        for handler in handlers {
            handler();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }
}

#[derive(Default)]
pub(crate) struct Lifecycle {
    stopped: Cell<bool>,
    /// Present while paused; resolving it releases every waiting evaluation.
    pausing: RefCell<Option<watch::Sender<bool>>>,
    pub abort_handlers: HandlerRegistry,
    pub pause_handlers: HandlerRegistry,
    pub unpause_handlers: HandlerRegistry,
}

impl Lifecycle {
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub fn is_paused(&self) -> bool {
        self.pausing.borrow().is_some()
    }

    /// Stop evaluation. Only the first call fires the abort handlers.
    pub fn abort(&self) {
        if self.stopped.replace(true) {
            return;
        }
        tracing::debug!("execution aborted");
        self.abort_handlers.fire_and_clear();
    }

    pub fn pause(&self) {
        if self.is_paused() {
            return;
        }
        let (tx, _rx) = watch::channel(false);
        *self.pausing.borrow_mut() = Some(tx);
        tracing::debug!("execution paused");
        self.pause_handlers.fire_and_clear();
    }

    pub fn unpause(&self) {
        let Some(tx) = self.pausing.borrow_mut().take() else {
            return;
        };
        tx.send_replace(true);
        tracing::debug!("execution resumed");
        self.unpause_handlers.fire_and_clear();
    }

    /// Suspend while a pause is in effect.
    pub async fn wait_unpaused(&self) {
        let rx = self.pausing.borrow().as_ref().map(|tx| tx.subscribe());
        if let Some(mut rx) = rx {
            // A dropped sender also means the pause is over.
            let _ = rx.wait_for(|resumed| *resumed).await;
        }
    }
}
