//! Platform seams: time, deferred callbacks and user notifications.
//!
//! The browser crate provides `window`-backed implementations; the types in
//! this module cover native hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};

use crate::error::Severity;

/// Scoped release handle. Runs its release action exactly once, either when
/// [`Disposer::dispose`] is called or when the handle is dropped.
#[must_use = "dropping a Disposer releases the resource immediately"]
pub struct Disposer(Option<Box<dyn FnOnce()>>);

impl Disposer {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    /// A handle that releases nothing.
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn dispose(mut self) {
        self.release();
    }

    /// Give up the release action; the resource stays alive.
    pub fn forget(mut self) {
        self.0 = None;
    }

    fn release(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Disposer").field(&self.0.is_some()).finish()
    }
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Rc<Cell<i64>>,
}

impl FixedClock {
    #[must_use]
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Rc::new(Cell::new(millis)),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.set(millis);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.set(self.millis.get() + delta);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.get()).unwrap_or_default()
    }

    fn now_millis(&self) -> i64 {
        self.millis.get()
    }
}

/// One-shot deferred execution. The returned disposer cancels the callback
/// if it has not fired yet.
pub trait Scheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer;
}

type TaskSlot = (u64, u64);

#[derive(Default)]
struct ManualQueue {
    now: u64,
    next_id: u64,
    tasks: BTreeMap<TaskSlot, Box<dyn FnOnce()>>,
}

/// Virtual-time scheduler: callbacks run only when [`ManualScheduler::advance`]
/// moves time past their due point.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn now(&self) -> u64 {
        self.queue.borrow().now
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Move virtual time forward, running every callback that comes due in
    /// order. Callbacks may schedule further work; anything due within the
    /// window also runs.
    pub fn advance(&self, delta_ms: u64) {
        let target = self.queue.borrow().now.saturating_add(delta_ms);
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due = queue
                    .tasks
                    .first_key_value()
                    .map(|(slot, _)| *slot)
                    .filter(|(due, _)| *due <= target);
                due.and_then(|slot| {
                    queue.now = slot.0;
                    queue.tasks.remove(&slot)
                })
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.queue.borrow_mut().now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer {
        let slot = {
            let mut queue = self.queue.borrow_mut();
            let slot = (queue.now + u64::from(delay_ms), queue.next_id);
            queue.next_id += 1;
            queue.tasks.insert(slot, callback);
            slot
        };
        let weak: Weak<RefCell<ManualQueue>> = Rc::downgrade(&self.queue);
        Disposer::new(move || {
            if let Some(queue) = weak.upgrade() {
                let removed = queue.borrow_mut().tasks.remove(&slot);
                drop(removed);
            }
        })
    }
}

/// Surface for transient user-facing messages.
pub trait Notifier {
    fn show(&self, message: &str, severity: Severity);
    fn dismiss(&self);
}

/// Notifier for hosts without a screen; messages go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, message: &str, severity: Severity) {
        log::warn!("[{severity}] {message}");
    }

    fn dismiss(&self) {}
}

/// Everything the core needs from its host.
#[derive(Clone)]
pub struct Platform {
    pub clock: Rc<dyn Clock>,
    pub scheduler: Rc<dyn Scheduler>,
    pub notifier: Rc<dyn Notifier>,
    pub user_agent: Option<String>,
}

impl Platform {
    /// Native host: system clock, log notifier, and a manual scheduler that
    /// nothing advances (notifications never auto-dismiss, which is harmless
    /// without a screen).
    #[must_use]
    pub fn headless() -> Self {
        Self {
            clock: Rc::new(SystemClock),
            scheduler: Rc::new(ManualScheduler::new()),
            notifier: Rc::new(LogNotifier),
            user_agent: None,
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}
