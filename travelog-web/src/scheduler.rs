//! `window.setTimeout` scheduler.

use std::cell::RefCell;
use std::rc::Rc;

use travelog_core::{Disposer, Scheduler};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::dom;

type Slot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Hand a closure back to the runtime once the current call stack unwinds.
/// Dropping a `Closure` while JavaScript is still executing it is an error.
pub(crate) fn release_later<T: ?Sized + 'static>(closure: Closure<T>) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(closure);
    });
}

fn release_slot(slot: &Slot) {
    if let Some(closure) = slot.borrow_mut().take() {
        release_later(closure);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowScheduler;

impl Scheduler for WindowScheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer {
        let Some(window) = dom::window() else {
            log::warn!("no window; timer of {delay_ms}ms dropped");
            return Disposer::noop();
        };

        let slot: Slot = Rc::new(RefCell::new(None));
        let mut task = Some(callback);
        let fired_slot = Rc::clone(&slot);
        let closure = Closure::wrap(Box::new(move || {
            if let Some(task) = task.take() {
                task();
            }
            release_slot(&fired_slot);
        }) as Box<dyn FnMut()>);

        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let handle = match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            delay,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                dom::console_error(&format!(
                    "setTimeout failed: {}",
                    dom::js_error_message(&err)
                ));
                return Disposer::noop();
            }
        };
        *slot.borrow_mut() = Some(closure);

        Disposer::new(move || {
            window.clear_timeout_with_handle(handle);
            release_slot(&slot);
        })
    }
}
