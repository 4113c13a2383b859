//! Periodic yielding during async execution.
//!
//! Every `rate` evaluation steps the interpreter sleeps briefly so that a
//! long-running script does not starve the rest of the event loop.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::Error;
use crate::native::BoxFuture;
use crate::Result;

pub const DEFAULT_IRQ_RATE: f64 = 300.0;
pub const DEFAULT_IRQ_SLEEP_MS: f64 = 5.0;

/// How to yield when an interrupt point is reached.
#[derive(Clone)]
pub enum IrqSleep {
    /// Sleep for this many milliseconds.
    Millis(f64),
    /// Await a host-supplied future.
    Custom(Rc<dyn Fn() -> BoxFuture<'static, ()>>),
}

impl Default for IrqSleep {
    fn default() -> Self {
        IrqSleep::Millis(DEFAULT_IRQ_SLEEP_MS)
    }
}

impl fmt::Debug for IrqSleep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqSleep::Millis(ms) => write!(f, "Millis({})", ms),
            IrqSleep::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Irq {
    rate: f64,
    sleep: IrqSleep,
}

impl Irq {
    /// A rate of 0 disables yielding.
    pub fn new(rate: Option<f64>, sleep: Option<IrqSleep>) -> Result<Self> {
        let rate = rate.unwrap_or(DEFAULT_IRQ_RATE);
        if !(rate >= 0.0) {
            return Err(Error::hostside(format!(
                "Invalid IRQ rate ({}): must be non-negative number",
                rate
            )));
        }
        let sleep = sleep.unwrap_or_default();
        if let IrqSleep::Millis(ms) = sleep {
            if !(ms >= 0.0) || Duration::try_from_secs_f64(ms / 1000.0).is_err() {
                return Err(Error::hostside("irqSleep must be a function or a positive number."));
            }
        }
        Ok(Self { rate, sleep })
    }

    pub fn is_due(&self, step_count: u64) -> bool {
        self.rate != 0.0 && (step_count as f64) % self.rate >= self.rate - 1.0
    }

    pub async fn sleep_if_due(&self, step_count: u64) {
        if !self.is_due(step_count) {
            return;
        }
        tracing::debug!(step_count, "irq yield");
        match &self.sleep {
            IrqSleep::Millis(ms) if *ms == 0.0 => tokio::task::yield_now().await,
            IrqSleep::Millis(ms) => tokio::time::sleep(Duration::from_secs_f64(ms / 1000.0)).await,
            IrqSleep::Custom(f) => f().await,
        }
    }
}
