//! Batches token text into at most one flush per repaint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::assembler::{Update, apply};
use crate::document::Document;

/// Schedules a single deferred flush.
///
/// `schedule` arms one flush, `due` resolves once it should run, and `cancel`
/// disarms it. `due` must be cancel-safe: dropping it before completion
/// leaves the armed flush in place.
#[async_trait::async_trait]
pub trait RepaintScheduler: Send {
    fn schedule(&mut self);

    fn cancel(&mut self);

    async fn due(&mut self);
}

/// Timer-backed scheduler; one repaint every `interval`.
pub struct IntervalScheduler {
    interval: Duration,
    deadline: Option<Instant>,
}

impl IntervalScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }
}

#[async_trait::async_trait]
impl RepaintScheduler for IntervalScheduler {
    fn schedule(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    async fn due(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[derive(Default)]
struct ManualShared {
    notify: Notify,
    scheduled: AtomicUsize,
}

/// Scheduler whose repaints only happen when [`ManualTick::fire`] is called.
///
/// Used by tests and by headless embedders that drive repaints themselves.
pub struct ManualScheduler {
    shared: Arc<ManualShared>,
    armed: bool,
}

/// Remote control for a [`ManualScheduler`].
#[derive(Clone)]
pub struct ManualTick {
    shared: Arc<ManualShared>,
}

impl ManualScheduler {
    pub fn pair() -> (Self, ManualTick) {
        let shared = Arc::new(ManualShared::default());
        (
            Self {
                shared: shared.clone(),
                armed: false,
            },
            ManualTick { shared },
        )
    }
}

impl ManualTick {
    /// Releases the pending flush, or the next one if none is armed yet.
    pub fn fire(&self) {
        self.shared.notify.notify_one();
    }

    /// Number of times a flush was scheduled.
    pub fn scheduled_count(&self) -> usize {
        self.shared.scheduled.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RepaintScheduler for ManualScheduler {
    fn schedule(&mut self) {
        if !self.armed {
            self.armed = true;
            self.shared.scheduled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cancel(&mut self) {
        self.armed = false;
    }

    async fn due(&mut self) {
        if !self.armed {
            return std::future::pending::<()>().await;
        }
        self.shared.notify.notified().await;
        self.armed = false;
    }
}

/// Buffers token text until the next repaint.
pub struct TokenCoalescer {
    buffer: String,
    scheduled: bool,
    scheduler: Box<dyn RepaintScheduler>,
}

impl TokenCoalescer {
    pub fn new(scheduler: Box<dyn RepaintScheduler>) -> Self {
        Self {
            buffer: String::new(),
            scheduled: false,
            scheduler,
        }
    }

    /// Convenience constructor for the timer-backed scheduler.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(Box::new(IntervalScheduler::new(interval)))
    }

    /// Buffers `text` and arms a flush unless one is already pending.
    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.buffer.push_str(text);
        if !self.scheduled {
            self.scheduler.schedule();
            self.scheduled = true;
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Text waiting for the next flush.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Resolves when the scheduled flush is due; never resolves if none is.
    pub async fn due(&mut self) {
        if !self.scheduled {
            return std::future::pending::<()>().await;
        }
        self.scheduler.due().await;
    }

    /// Takes the buffered text and disarms any pending flush.
    pub fn take(&mut self) -> Option<String> {
        if self.scheduled {
            self.scheduler.cancel();
            self.scheduled = false;
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Flushes buffered text into the document.
    pub fn flush_into(&mut self, doc: Document) -> Document {
        match self.take() {
            Some(text) => apply(doc, Update::FlushedText(text)),
            None => doc,
        }
    }
}
