//! Central registry of event subscriptions and named timers.
//!
//! Every subscription is keyed by `(target, event name)`; registering the
//! same key again replaces the earlier subscription. All handlers are gated
//! on one shared [`CancelToken`], so [`EventManager::cleanup`] silences every
//! tracked subscription at once before detaching them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::platform::{Disposer, Scheduler};

/// Shared handler type; `E` is the host's event payload.
pub type Handler<E> = Rc<dyn Fn(&E)>;

/// Stable identity of an event target, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    pub capture: bool,
    pub passive: bool,
    /// Remove the subscription after its first delivery
    pub once: bool,
}

/// Something listeners can be attached to (a DOM node, the window, a test
/// double).
pub trait EventSource<E> {
    fn target_id(&self) -> TargetId;

    /// Whether the target is still part of the live document. Targets that
    /// cannot be detached report `true`.
    fn is_connected(&self) -> bool;

    /// Attach `handler`; the returned disposer detaches it.
    fn attach(&self, event: &str, handler: Handler<E>, options: ListenOptions) -> Disposer;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey {
    pub target: TargetId,
    pub event: String,
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey(pub String);

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Revocable gate shared by every handler registered under one generation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

struct Registration {
    generation: u64,
    connected: Box<dyn Fn() -> bool>,
    detach: Disposer,
}

struct PendingTimer {
    generation: u64,
    cancel: Disposer,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<ListenerKey, Registration>,
    timers: HashMap<TimerKey, PendingTimer>,
    token: CancelToken,
    next_generation: u64,
    next_anonymous_timer: u64,
    sweep: Option<Disposer>,
}

impl Registry {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

/// Remove `key` if it is still the registration made under `generation`.
fn remove_listener_if(registry: &Weak<RefCell<Registry>>, key: &ListenerKey, generation: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = {
        let mut reg = registry.borrow_mut();
        let current = reg
            .listeners
            .get(key)
            .is_some_and(|r| r.generation == generation);
        if current { reg.listeners.remove(key) } else { None }
    };
    drop(removed);
}

fn remove_timer_if(registry: &Weak<RefCell<Registry>>, key: &TimerKey, generation: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = {
        let mut reg = registry.borrow_mut();
        let current = reg
            .timers
            .get(key)
            .is_some_and(|t| t.generation == generation);
        if current { reg.timers.remove(key) } else { None }
    };
    if let Some(timer) = removed {
        // Already fired; nothing left to cancel.
        timer.cancel.forget();
    }
}

fn arm_sweep(registry: &Rc<RefCell<Registry>>, scheduler: &Rc<dyn Scheduler>, interval_ms: u32) {
    let weak = Rc::downgrade(registry);
    let sched = Rc::clone(scheduler);
    let timer = scheduler.schedule(
        interval_ms,
        Box::new(move || {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            let removed = sweep_registry(&registry);
            if removed > 0 {
                log::debug!("listener sweep removed {removed} detached subscriptions");
            }
            arm_sweep(&registry, &sched, interval_ms);
        }),
    );
    let previous = registry.borrow_mut().sweep.replace(timer);
    if let Some(previous) = previous {
        previous.forget();
    }
}

fn sweep_registry(registry: &Rc<RefCell<Registry>>) -> usize {
    let stale: Vec<Registration> = {
        let mut reg = registry.borrow_mut();
        let keys: Vec<ListenerKey> = reg
            .listeners
            .iter()
            .filter(|(_, r)| !(r.connected)())
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter()
            .filter_map(|key| reg.listeners.remove(key))
            .collect()
    };
    stale.len()
}

/// Subscription and timer registry for one application session.
pub struct EventManager<E> {
    registry: Rc<RefCell<Registry>>,
    scheduler: Rc<dyn Scheduler>,
    sweep_interval_ms: u32,
    _event: PhantomData<fn(&E)>,
}

impl<E: 'static> EventManager<E> {
    #[must_use]
    pub fn new(scheduler: Rc<dyn Scheduler>, sweep_interval_ms: u32) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
            scheduler,
            sweep_interval_ms,
            _event: PhantomData,
        }
    }

    /// Subscribe `handler` to `event` on `target`, replacing any earlier
    /// subscription under the same key.
    pub fn add_event_listener<T>(
        &self,
        target: &T,
        event: &str,
        handler: impl Fn(&E) + 'static,
        options: ListenOptions,
    ) -> ListenerKey
    where
        T: EventSource<E> + Clone + 'static,
    {
        self.register(target, event, Rc::new(handler), options).0
    }

    /// Subscribe for a single delivery.
    pub fn add_event_listener_once<T>(
        &self,
        target: &T,
        event: &str,
        handler: impl Fn(&E) + 'static,
        options: ListenOptions,
    ) -> ListenerKey
    where
        T: EventSource<E> + Clone + 'static,
    {
        let options = ListenOptions {
            once: true,
            ..options
        };
        self.register(target, event, Rc::new(handler), options).0
    }

    fn register<T>(
        &self,
        target: &T,
        event: &str,
        handler: Handler<E>,
        options: ListenOptions,
    ) -> (ListenerKey, u64)
    where
        T: EventSource<E> + Clone + 'static,
    {
        let key = ListenerKey {
            target: target.target_id(),
            event: event.to_string(),
        };
        let (generation, token, previous) = {
            let mut reg = self.registry.borrow_mut();
            let previous = reg.listeners.remove(&key);
            (reg.bump(), reg.token.clone(), previous)
        };
        drop(previous);

        let weak = Rc::downgrade(&self.registry);
        let once_key = key.clone();
        let gated: Handler<E> = Rc::new(move |ev: &E| {
            if token.is_cancelled() {
                return;
            }
            handler(ev);
            if options.once {
                remove_listener_if(&weak, &once_key, generation);
            }
        });

        let detach = target.attach(event, gated, options);
        let probe = target.clone();
        let registration = Registration {
            generation,
            connected: Box::new(move || probe.is_connected()),
            detach,
        };
        self.registry
            .borrow_mut()
            .listeners
            .insert(key.clone(), registration);
        (key, generation)
    }

    /// Detach one subscription. Returns whether it was tracked.
    pub fn remove_event_listener(&self, key: &ListenerKey) -> bool {
        let removed = self.registry.borrow_mut().listeners.remove(key);
        removed.is_some()
    }

    /// Run `callback` after `delay_ms`. A pending timer under the same name
    /// is cancelled first; unnamed timers get a generated name.
    pub fn set_timeout(
        &self,
        callback: impl FnOnce() + 'static,
        delay_ms: u32,
        name: Option<&str>,
    ) -> TimerKey {
        self.start_timer(Box::new(callback), delay_ms, name).0
    }

    fn start_timer(
        &self,
        callback: Box<dyn FnOnce()>,
        delay_ms: u32,
        name: Option<&str>,
    ) -> (TimerKey, u64) {
        let (key, generation, token, previous) = {
            let mut reg = self.registry.borrow_mut();
            let key = if let Some(name) = name {
                TimerKey(name.to_string())
            } else {
                reg.next_anonymous_timer += 1;
                TimerKey(format!("timer_{}", reg.next_anonymous_timer))
            };
            let previous = reg.timers.remove(&key);
            (key, reg.bump(), reg.token.clone(), previous)
        };
        drop(previous);

        let weak = Rc::downgrade(&self.registry);
        let fired_key = key.clone();
        let cancel = self.scheduler.schedule(
            delay_ms,
            Box::new(move || {
                remove_timer_if(&weak, &fired_key, generation);
                if !token.is_cancelled() {
                    callback();
                }
            }),
        );
        self.registry
            .borrow_mut()
            .timers
            .insert(key.clone(), PendingTimer { generation, cancel });
        (key, generation)
    }

    /// Cancel a pending timer. Returns whether it was still pending.
    pub fn clear_timeout(&self, key: &TimerKey) -> bool {
        let removed = self.registry.borrow_mut().timers.remove(key);
        removed.is_some()
    }

    /// Revoke the shared token, detach every subscription, cancel every
    /// timer, and start a fresh token for later registrations. The sweep
    /// keeps running.
    pub fn cleanup(&self) {
        let (listeners, timers) = {
            let mut reg = self.registry.borrow_mut();
            reg.token.cancel();
            reg.token = CancelToken::default();
            (
                std::mem::take(&mut reg.listeners),
                std::mem::take(&mut reg.timers),
            )
        };
        let (listener_count, timer_count) = (listeners.len(), timers.len());
        drop(listeners);
        drop(timers);
        log::debug!("event cleanup released {listener_count} listeners and {timer_count} timers");
    }

    /// Drop subscriptions whose target has left the document.
    pub fn sweep_detached(&self) -> usize {
        sweep_registry(&self.registry)
    }

    pub fn start_sweep(&self) {
        self.stop_sweep();
        arm_sweep(&self.registry, &self.scheduler, self.sweep_interval_ms);
    }

    pub fn stop_sweep(&self) {
        let sweep = self.registry.borrow_mut().sweep.take();
        drop(sweep);
    }

    #[must_use]
    pub fn get_active_listeners_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    #[must_use]
    pub fn get_active_timers_count(&self) -> usize {
        self.registry.borrow().timers.len()
    }

    #[must_use]
    pub fn has_listener(&self, key: &ListenerKey) -> bool {
        self.registry.borrow().listeners.contains_key(key)
    }

    /// Composite disposer for one UI lifetime (a modal, a tab).
    #[must_use]
    pub fn scope(&self) -> EventScope<'_, E> {
        EventScope {
            manager: self,
            listeners: Vec::new(),
            timers: Vec::new(),
        }
    }
}

impl<E> Drop for EventManager<E> {
    fn drop(&mut self) {
        let (listeners, timers, sweep) = {
            let mut reg = self.registry.borrow_mut();
            reg.token.cancel();
            (
                std::mem::take(&mut reg.listeners),
                std::mem::take(&mut reg.timers),
                reg.sweep.take(),
            )
        };
        drop((listeners, timers, sweep));
    }
}

impl<E> fmt::Debug for EventManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.registry.borrow();
        f.debug_struct("EventManager")
            .field("listeners", &reg.listeners.len())
            .field("timers", &reg.timers.len())
            .field("sweeping", &reg.sweep.is_some())
            .finish_non_exhaustive()
    }
}

/// Registrations made through a scope are released when it drops, unless
/// the same key has been re-registered elsewhere since.
pub struct EventScope<'m, E: 'static> {
    manager: &'m EventManager<E>,
    listeners: Vec<(ListenerKey, u64)>,
    timers: Vec<(TimerKey, u64)>,
}

impl<E: 'static> EventScope<'_, E> {
    pub fn add_event_listener<T>(
        &mut self,
        target: &T,
        event: &str,
        handler: impl Fn(&E) + 'static,
        options: ListenOptions,
    ) -> ListenerKey
    where
        T: EventSource<E> + Clone + 'static,
    {
        let (key, generation) = self
            .manager
            .register(target, event, Rc::new(handler), options);
        self.listeners.push((key.clone(), generation));
        key
    }

    pub fn set_timeout(
        &mut self,
        callback: impl FnOnce() + 'static,
        delay_ms: u32,
        name: Option<&str>,
    ) -> TimerKey {
        let (key, generation) = self.manager.start_timer(Box::new(callback), delay_ms, name);
        self.timers.push((key.clone(), generation));
        key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len() + self.timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Drop for EventScope<'_, E> {
    fn drop(&mut self) {
        let weak = Rc::downgrade(&self.manager.registry);
        for (key, generation) in self.listeners.drain(..) {
            remove_listener_if(&weak, &key, generation);
        }
        let removed: Vec<PendingTimer> = {
            let mut reg = self.manager.registry.borrow_mut();
            self.timers
                .drain(..)
                .filter_map(|(key, generation)| {
                    let current = reg
                        .timers
                        .get(&key)
                        .is_some_and(|t| t.generation == generation);
                    if current { reg.timers.remove(&key) } else { None }
                })
                .collect()
        };
        drop(removed);
    }
}
