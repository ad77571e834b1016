use std::cell::{Cell, RefCell};
use std::rc::Rc;

use travelog_core::{
    Disposer, EventManager, EventSource, Handler, ListenOptions, ManualScheduler, TargetId,
};

/// Minimal stand-in for a DOM node.
#[derive(Clone)]
struct Node {
    id: u64,
    attached: Rc<Cell<bool>>,
    handlers: Rc<RefCell<Vec<(String, Handler<()>)>>>,
}

impl Node {
    fn new(id: u64) -> Self {
        Self {
            id,
            attached: Rc::new(Cell::new(true)),
            handlers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn fire(&self, event: &str) {
        let handlers: Vec<Handler<()>> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&());
        }
    }
}

impl EventSource<()> for Node {
    fn target_id(&self) -> TargetId {
        TargetId(self.id)
    }

    fn is_connected(&self) -> bool {
        self.attached.get()
    }

    fn attach(&self, event: &str, handler: Handler<()>, _options: ListenOptions) -> Disposer {
        let probe = Rc::clone(&handler);
        self.handlers
            .borrow_mut()
            .push((event.to_string(), handler));
        let handlers = Rc::clone(&self.handlers);
        Disposer::new(move || {
            handlers
                .borrow_mut()
                .retain(|(_, h)| !Rc::ptr_eq(h, &probe));
        })
    }
}

fn setup() -> (EventManager<()>, ManualScheduler) {
    let scheduler = ManualScheduler::new();
    (EventManager::new(Rc::new(scheduler.clone()), 30_000), scheduler)
}

#[test]
fn cleanup_empties_registry_and_cancels_named_timer() {
    let (events, scheduler) = setup();
    let save = Node::new(1);
    let close = Node::new(2);
    let clicks = Rc::new(Cell::new(0));
    let c = Rc::clone(&clicks);
    events.add_event_listener(
        &save,
        "click",
        move |_| c.set(c.get() + 1),
        ListenOptions::default(),
    );
    events.add_event_listener(&close, "click", |_| {}, ListenOptions::default());

    let fired = Rc::new(Cell::new(false));
    let f = Rc::clone(&fired);
    events.set_timeout(move || f.set(true), 300, Some("autosave"));

    events.cleanup();
    assert_eq!(events.get_active_listeners_count(), 0);
    assert_eq!(events.get_active_timers_count(), 0);

    scheduler.advance(1_000);
    save.fire("click");
    assert!(!fired.get());
    assert_eq!(clicks.get(), 0);

    // The manager keeps working after a cleanup.
    let c = Rc::clone(&clicks);
    events.add_event_listener(
        &save,
        "click",
        move |_| c.set(c.get() + 1),
        ListenOptions::default(),
    );
    save.fire("click");
    assert_eq!(clicks.get(), 1);
}

#[test]
fn named_timer_is_debounced_and_untracked_after_firing() {
    let (events, scheduler) = setup();
    let runs = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let r = Rc::clone(&runs);
        events.set_timeout(move || r.set(r.get() + 1), 200, Some("search"));
        scheduler.advance(50);
    }
    assert_eq!(events.get_active_timers_count(), 1);
    scheduler.advance(200);
    assert_eq!(runs.get(), 1);
    assert_eq!(events.get_active_timers_count(), 0);
}

#[test]
fn modal_scope_releases_its_registrations() {
    let (events, _) = setup();
    let page = Node::new(1);
    events.add_event_listener(&page, "scroll", |_| {}, ListenOptions::default());
    {
        let modal = Node::new(2);
        let mut scope = events.scope();
        scope.add_event_listener(&modal, "click", |_| {}, ListenOptions::default());
        scope.add_event_listener(&modal, "keydown", |_| {}, ListenOptions::default());
        scope.set_timeout(|| {}, 5_000, Some("modalFade"));
        assert_eq!(scope.len(), 3);
        assert_eq!(events.get_active_listeners_count(), 3);
    }
    assert_eq!(events.get_active_listeners_count(), 1);
    assert_eq!(events.get_active_timers_count(), 0);
}

#[test]
fn sweep_drops_subscriptions_on_detached_nodes() {
    let (events, scheduler) = setup();
    let card = Node::new(9);
    events.add_event_listener(&card, "click", |_| {}, ListenOptions::default());
    events.start_sweep();

    card.attached.set(false);
    scheduler.advance(29_999);
    assert_eq!(events.get_active_listeners_count(), 1);
    scheduler.advance(1);
    assert_eq!(events.get_active_listeners_count(), 0);
    assert!(card.handlers.borrow().is_empty());

    events.stop_sweep();
    assert_eq!(scheduler.pending(), 0);
}
