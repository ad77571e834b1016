//! DOM targets as [`EventSource`]s for the core event manager.

use std::cell::Cell;

use travelog_core::{Disposer, EventSource, Handler, ListenOptions, TargetId};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Event, EventListenerOptions, EventTarget, Node};

use crate::dom;
use crate::scheduler::release_later;

/// Property used to pin a stable id onto a target object.
pub const TARGET_ID_PROPERTY: &str = "__travelogTargetId";

thread_local! {
    static NEXT_TARGET_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_target_id() -> u64 {
    NEXT_TARGET_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

/// Stable identity for a JS object: reuse the id pinned on it, or pin a
/// fresh one. Objects that refuse new properties get an unpinned id.
fn identify(target: &EventTarget) -> TargetId {
    let property = JsValue::from_str(TARGET_ID_PROPERTY);
    if let Some(existing) = js_sys::Reflect::get(target, &property)
        .ok()
        .and_then(|value| value.as_f64())
    {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return TargetId(existing as u64);
    }
    let id = next_target_id();
    #[allow(clippy::cast_precision_loss)]
    let pinned = js_sys::Reflect::set(target, &property, &JsValue::from_f64(id as f64));
    if !matches!(pinned, Ok(true)) {
        log::debug!("could not pin id on event target; using transient {id}");
    }
    TargetId(id)
}

/// A DOM node, the window, or any other `EventTarget`.
#[derive(Debug, Clone)]
pub struct DomEventSource {
    target: EventTarget,
    id: TargetId,
}

impl DomEventSource {
    #[must_use]
    pub fn new(target: &EventTarget) -> Self {
        Self {
            id: identify(target),
            target: target.clone(),
        }
    }

    /// The global window; `None` outside a browser.
    #[must_use]
    pub fn window() -> Option<Self> {
        dom::window().map(|w| Self::new(&w))
    }

    #[must_use]
    pub const fn target(&self) -> &EventTarget {
        &self.target
    }
}

impl EventSource<Event> for DomEventSource {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.target
            .dyn_ref::<Node>()
            .is_none_or(Node::is_connected)
    }

    fn attach(&self, event: &str, handler: Handler<Event>, options: ListenOptions) -> Disposer {
        let closure =
            Closure::wrap(Box::new(move |ev: Event| handler(&ev)) as Box<dyn FnMut(Event)>);

        let add = AddEventListenerOptions::new();
        add.set_capture(options.capture);
        add.set_passive(options.passive);
        add.set_once(options.once);
        if let Err(err) = self
            .target
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                closure.as_ref().unchecked_ref(),
                &add,
            )
        {
            dom::console_error(&format!(
                "addEventListener({event}) failed: {}",
                dom::js_error_message(&err)
            ));
            return Disposer::noop();
        }

        let target = self.target.clone();
        let event = event.to_string();
        Disposer::new(move || {
            let remove = EventListenerOptions::new();
            remove.set_capture(options.capture);
            let _ = target.remove_event_listener_with_callback_and_event_listener_options(
                &event,
                closure.as_ref().unchecked_ref(),
                &remove,
            );
            release_later(closure);
        })
    }
}
