#![forbid(unsafe_code)]
//! Browser bindings for Travelog: the `localStorage` backend, DOM event
//! sources, `window` timers, the toast notifier, and the
//! [`app::TravelLogApp`] facade UI scripts talk to.
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod app;
pub mod clock;
pub mod dom;
pub mod download;
pub mod events;
pub mod notify;
pub mod scheduler;
pub mod storage;

pub use app::TravelLogApp;
pub use clock::BrowserClock;
pub use events::DomEventSource;
pub use notify::ToastNotifier;
pub use scheduler::WindowScheduler;
pub use storage::BrowserStorage;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    if dom::local_storage().is_err() {
        dom::console_error("localStorage is unavailable; changes will not be kept");
    }
}
