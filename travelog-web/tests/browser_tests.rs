#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use travelog_core::{EventManager, EventSource, KeyValueStore, ListenOptions};
use travelog_web::{BrowserStorage, DomEventSource, TravelLogApp, WindowScheduler, dom};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::Event;

wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn dom_helpers_find_window_and_document() {
    assert!(dom::window().is_some());
    assert!(dom::document().is_some());
    assert!(dom::local_storage().is_ok());
}

#[wasm_bindgen_test]
fn browser_storage_round_trips() {
    let storage = BrowserStorage::local();
    storage.set("travelog_test_key", "[1,2]").expect("set");
    assert_eq!(
        storage.get("travelog_test_key").expect("get").as_deref(),
        Some("[1,2]")
    );
    assert!(storage.keys().expect("keys").iter().any(|k| k == "travelog_test_key"));
    storage.remove("travelog_test_key").expect("remove");
    assert_eq!(storage.get("travelog_test_key").expect("get"), None);
}

#[wasm_bindgen_test]
fn target_identity_is_stable_and_detachment_is_seen() {
    let document = dom::document().expect("document");
    let node = document.create_element("button").expect("button");
    let first = DomEventSource::new(&node);
    let second = DomEventSource::new(&node);
    assert_eq!(first.target_id(), second.target_id());
    assert!(!first.is_connected());

    document.body().expect("body").append_child(&node).expect("append");
    assert!(first.is_connected());
    node.remove();
}

#[wasm_bindgen_test]
fn cleanup_detaches_dom_listeners() {
    let document = dom::document().expect("document");
    let node = document.create_element("div").expect("div");
    document.body().expect("body").append_child(&node).expect("append");

    let events: EventManager<Event> = EventManager::new(Rc::new(WindowScheduler), 30_000);
    let source = DomEventSource::new(&node);
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    events.add_event_listener(
        &source,
        "ping",
        move |_| h.set(h.get() + 1),
        ListenOptions::default(),
    );

    node.dispatch_event(&Event::new("ping").expect("event"))
        .expect("dispatch");
    assert_eq!(hits.get(), 1);

    events.cleanup();
    assert_eq!(events.get_active_listeners_count(), 0);
    node.dispatch_event(&Event::new("ping").expect("event"))
        .expect("dispatch");
    assert_eq!(hits.get(), 1);
    node.remove();
}

#[wasm_bindgen_test]
fn window_hooks_survive_renderer_cleanup() {
    let app = TravelLogApp::new(JsValue::UNDEFINED).expect("app");
    assert_eq!(app.get_active_listeners_count(), 0);
    app.clear_error_log();
    app.cleanup();

    let window = dom::window().expect("window");
    window
        .dispatch_event(&Event::new("unhandledrejection").expect("event"))
        .expect("dispatch");
    let log = js_sys::Array::from(&app.get_error_log().expect("log"));
    assert_eq!(log.length(), 1);
}
