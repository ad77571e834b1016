//! JavaScript-facing facade. UI renderers hold one `TravelLogApp` and go
//! through it for every read and mutation.

use std::fmt::Display;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use travelog_core::{
    AppSettings, ErrorContext, EventManager, EventSource, ListenOptions, ListenerKey, Platform,
    Residence, Severity, SortSettings, TimerKey, TravelLog, TravelLogConfig, stats,
};
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget};

use crate::clock::BrowserClock;
use crate::download;
use crate::events::DomEventSource;
use crate::notify::ToastNotifier;
use crate::scheduler::WindowScheduler;
use crate::storage::BrowserStorage;

/// Failures raised by JavaScript itself (uncaught errors, rejections),
/// carried into the error log.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{0}")]
    Uncaught(String),
    #[error("unhandled rejection: {0}")]
    Rejection(String),
}

fn js_err(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(Into::into)
}

fn read_property(value: &JsValue, name: &str) -> Option<String> {
    js_sys::Reflect::get(value, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
        .map(|v| crate::dom::js_error_message(&v))
}

fn parse_severity(name: &str) -> Severity {
    match name.to_ascii_uppercase().as_str() {
        "LOW" => Severity::Low,
        "HIGH" => Severity::High,
        "CRITICAL" => Severity::Critical,
        _ => Severity::Medium,
    }
}

#[wasm_bindgen]
pub struct TravelLogApp {
    log: TravelLog<BrowserStorage>,
    events: Rc<EventManager<Event>>,
    /// Window hooks owned by the app itself; `cleanup` never reaches them.
    hooks: EventManager<Event>,
}

#[wasm_bindgen]
impl TravelLogApp {
    /// Open the session. `config` is an optional partial
    /// `TravelLogConfig` object.
    ///
    /// # Errors
    /// Returns an error if `config` is present but invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<TravelLogApp, JsValue> {
        let config: TravelLogConfig = if config.is_undefined() || config.is_null() {
            TravelLogConfig::default()
        } else {
            from_js(config)?
        };
        config.validate().map_err(js_err)?;

        let platform = Platform {
            clock: Rc::new(BrowserClock),
            scheduler: Rc::new(WindowScheduler),
            notifier: Rc::new(ToastNotifier::new()),
            user_agent: crate::dom::user_agent(),
        };
        let events = Rc::new(EventManager::new(
            Rc::clone(&platform.scheduler),
            config.sweep_interval_ms,
        ));
        let hooks = EventManager::new(Rc::clone(&platform.scheduler), config.sweep_interval_ms);
        let log = TravelLog::open(BrowserStorage::local(), platform, config);

        let app = Self { log, events, hooks };
        app.install_window_hooks();
        app.events.start_sweep();
        Ok(app)
    }

    /// Uncaught errors and rejections go to the error log; page unload
    /// tears every renderer subscription down. These live in `hooks`, so
    /// they outlive any renderer-driven `cleanup`.
    fn install_window_hooks(&self) {
        let Some(window) = DomEventSource::window() else {
            return;
        };

        let errors = self.log.errors().clone();
        self.hooks.add_event_listener(
            &window,
            "error",
            move |ev: &Event| {
                let message = read_property(ev, "message").unwrap_or_else(|| "script error".into());
                let context = ErrorContext::new()
                    .with("source", read_property(ev, "filename").unwrap_or_default())
                    .with("line", read_property(ev, "lineno").unwrap_or_default());
                errors.handle_error(&ScriptError::Uncaught(message), context, Severity::High);
            },
            ListenOptions::default(),
        );

        let errors = self.log.errors().clone();
        self.hooks.add_event_listener(
            &window,
            "unhandledrejection",
            move |ev: &Event| {
                let reason = read_property(ev, "reason").unwrap_or_else(|| "unknown".into());
                errors.handle_error(
                    &ScriptError::Rejection(reason),
                    ErrorContext::new(),
                    Severity::High,
                );
            },
            ListenOptions::default(),
        );

        let events: Weak<EventManager<Event>> = Rc::downgrade(&self.events);
        self.hooks.add_event_listener(
            &window,
            "beforeunload",
            move |_: &Event| {
                if let Some(events) = events.upgrade() {
                    events.stop_sweep();
                    events.cleanup();
                }
            },
            ListenOptions::default(),
        );
    }

    // Entries

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn entries(&self) -> Result<JsValue, JsValue> {
        to_js(self.log.entries())
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn entry(&self, id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.log.entry(id))
    }

    /// Re-read the namespace's entries from storage.
    ///
    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = loadEntries)]
    pub fn load_entries(&mut self) -> Result<JsValue, JsValue> {
        to_js(self.log.load_entries())
    }

    /// # Errors
    /// Returns an error if the save failed (it is also in the error log).
    #[wasm_bindgen(js_name = saveEntries)]
    pub fn save_entries(&self) -> Result<(), JsValue> {
        self.log.save_entries().map_err(js_err)
    }

    /// # Errors
    /// Returns an error if the draft is malformed or fails validation.
    #[wasm_bindgen(js_name = addEntry)]
    pub fn add_entry(&mut self, draft: JsValue) -> Result<JsValue, JsValue> {
        let draft = from_js(draft)?;
        let entry = self.log.add_entry(draft).map_err(js_err)?;
        to_js(entry)
    }

    /// # Errors
    /// Returns an error for unknown ids, malformed drafts, or failed
    /// validation.
    #[wasm_bindgen(js_name = updateEntry)]
    pub fn update_entry(&mut self, id: &str, draft: JsValue) -> Result<JsValue, JsValue> {
        let draft = from_js(draft)?;
        let entry = self.log.update_entry(id, draft).map_err(js_err)?;
        to_js(entry)
    }

    /// # Errors
    /// Returns an error for unknown ids.
    #[wasm_bindgen(js_name = deleteEntry)]
    pub fn delete_entry(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let removed = self.log.delete_entry(id).map_err(js_err)?;
        to_js(&removed)
    }

    // Residence, identity, preferences

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn residence(&self) -> Result<JsValue, JsValue> {
        to_js(self.log.residence())
    }

    /// # Errors
    /// Returns an error if `residence` is not a residence object.
    #[wasm_bindgen(js_name = setResidence)]
    pub fn set_residence(&mut self, residence: JsValue) -> Result<(), JsValue> {
        let residence: Residence = from_js(residence)?;
        self.log.set_residence(residence);
        Ok(())
    }

    #[wasm_bindgen(js_name = clearResidence)]
    pub fn clear_residence(&mut self) {
        self.log.clear_residence();
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn identity(&self) -> Result<JsValue, JsValue> {
        to_js(self.log.identity())
    }

    /// # Errors
    /// Returns an error if `id` is blank.
    pub fn login(&mut self, id: &str, username: &str) -> Result<(), JsValue> {
        self.log.login(id, username).map_err(js_err)
    }

    pub fn logout(&mut self) {
        self.log.logout();
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = sortSettings)]
    pub fn sort_settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.sort_settings())
    }

    /// # Errors
    /// Returns an error if `settings` is malformed.
    #[wasm_bindgen(js_name = setSortSettings)]
    pub fn set_sort_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: SortSettings = from_js(settings)?;
        self.log.set_sort_settings(settings);
        Ok(())
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = appSettings)]
    pub fn app_settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.app_settings())
    }

    /// # Errors
    /// Returns an error if `settings` is malformed.
    #[wasm_bindgen(js_name = setAppSettings)]
    pub fn set_app_settings(&self, settings: JsValue) -> Result<(), JsValue> {
        let settings: AppSettings = from_js(settings)?;
        self.log.set_app_settings(settings);
        Ok(())
    }

    // Statistics

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = visitStats)]
    pub fn visit_stats(&self, city: &str, country_code: &str) -> Result<JsValue, JsValue> {
        to_js(&stats::visit_stats(city, country_code, self.log.entries()))
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = countryStats)]
    pub fn country_stats(&self, country_code: &str) -> Result<JsValue, JsValue> {
        to_js(&stats::country_stats(country_code, self.log.entries()))
    }

    #[wasm_bindgen(js_name = totalOverseasDays)]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_overseas_days(&self) -> f64 {
        self.log.total_overseas_days() as f64
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = cityHistory)]
    pub fn city_history(&self, id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.log.city_history(id))
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = countrySummaries)]
    pub fn country_summaries(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.country_summaries())
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn overview(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.overview())
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn timeline(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.timeline())
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = rankedByRating)]
    pub fn ranked_by_rating(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.ranked_by_rating())
    }

    // Backup

    /// Offer the current namespace as a JSON download.
    ///
    /// # Errors
    /// Returns the DOM error if the download cannot be started.
    #[wasm_bindgen(js_name = exportData)]
    pub fn export_data(&self) -> Result<String, JsValue> {
        let file = self.log.export_snapshot();
        download::download(&file)?;
        Ok(file.file_name)
    }

    /// # Errors
    /// Returns an error if `text` is not a snapshot; nothing changes then.
    #[wasm_bindgen(js_name = importData)]
    pub fn import_data(&mut self, text: &str) -> Result<usize, JsValue> {
        self.log.import_snapshot(text).map_err(js_err)
    }

    // Diagnostics

    /// Record an error raised by a UI renderer. `severity` is one of
    /// `LOW`, `MEDIUM`, `HIGH`, `CRITICAL` (default `MEDIUM`).
    ///
    /// # Errors
    /// Returns an error if `context` is present but not an object.
    #[wasm_bindgen(js_name = handleError)]
    pub fn handle_error(
        &self,
        message: &str,
        context: JsValue,
        severity: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let context: ErrorContext = if context.is_undefined() || context.is_null() {
            ErrorContext::new()
        } else {
            from_js(context)?
        };
        let severity = severity.as_deref().map_or(Severity::Medium, parse_severity);
        let record = self.log.errors().handle_error(
            &ScriptError::Uncaught(message.to_string()),
            context,
            severity,
        );
        to_js(&record)
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = getErrorLog)]
    pub fn get_error_log(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.errors().get_error_log())
    }

    #[wasm_bindgen(js_name = clearErrorLog)]
    pub fn clear_error_log(&self) {
        self.log.errors().clear_error_log();
    }

    /// # Errors
    /// Returns an error if serialisation fails.
    #[wasm_bindgen(js_name = errorCounts)]
    pub fn error_counts(&self) -> Result<JsValue, JsValue> {
        to_js(&self.log.errors().error_counts())
    }

    #[wasm_bindgen(js_name = isStorageAvailable)]
    pub fn is_storage_available(&self) -> bool {
        self.log.persistence().storage().is_storage_available()
    }

    #[wasm_bindgen(js_name = getStorageUsage)]
    pub fn get_storage_usage(&self) -> usize {
        self.log.persistence().storage().get_storage_usage()
    }

    // Event manager

    /// Subscribe `callback` to `event` on `target`, replacing any earlier
    /// subscription for the same pair. Returns the subscription key.
    #[wasm_bindgen(js_name = addEventListener)]
    pub fn add_event_listener(
        &self,
        target: &EventTarget,
        event: &str,
        callback: js_sys::Function,
        once: Option<bool>,
    ) -> String {
        let source = DomEventSource::new(target);
        let errors = self.log.errors().clone();
        let handler = move |ev: &Event| {
            if let Err(err) = callback.call1(&JsValue::NULL, ev) {
                errors.handle_error(
                    &ScriptError::Uncaught(crate::dom::js_error_message(&err)),
                    ErrorContext::new().with("operation", "eventHandler"),
                    Severity::Medium,
                );
            }
        };
        let options = ListenOptions::default();
        let key = if once.unwrap_or(false) {
            self.events
                .add_event_listener_once(&source, event, handler, options)
        } else {
            self.events.add_event_listener(&source, event, handler, options)
        };
        key.to_string()
    }

    #[wasm_bindgen(js_name = removeEventListener)]
    pub fn remove_event_listener(&self, target: &EventTarget, event: &str) -> bool {
        let key = ListenerKey {
            target: DomEventSource::new(target).target_id(),
            event: event.to_string(),
        };
        self.events.remove_event_listener(&key)
    }

    /// Run `callback` after `delay` ms. A pending timer under the same
    /// `name` is cancelled first. Returns the timer key.
    #[wasm_bindgen(js_name = setTimeout)]
    pub fn set_timeout(
        &self,
        callback: js_sys::Function,
        delay: u32,
        name: Option<String>,
    ) -> String {
        let errors = self.log.errors().clone();
        let key = self.events.set_timeout(
            move || {
                if let Err(err) = callback.call0(&JsValue::NULL) {
                    errors.handle_error(
                        &ScriptError::Uncaught(crate::dom::js_error_message(&err)),
                        ErrorContext::new().with("operation", "timer"),
                        Severity::Medium,
                    );
                }
            },
            delay,
            name.as_deref(),
        );
        key.to_string()
    }

    #[wasm_bindgen(js_name = clearTimeout)]
    pub fn clear_timeout(&self, key: String) -> bool {
        self.events.clear_timeout(&TimerKey(key))
    }

    /// Detach every tracked subscription and cancel every timer.
    pub fn cleanup(&self) {
        self.events.cleanup();
    }

    #[wasm_bindgen(js_name = getActiveListenersCount)]
    pub fn get_active_listeners_count(&self) -> usize {
        self.events.get_active_listeners_count()
    }

    #[wasm_bindgen(js_name = getActiveTimersCount)]
    pub fn get_active_timers_count(&self) -> usize {
        self.events.get_active_timers_count()
    }

    /// Percentage helper exposed for renderers that compose their own views.
    #[wasm_bindgen(js_name = percentage)]
    pub fn percentage(part: f64, whole: f64) -> f64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let pct = stats::percentage(part as i64, whole as i64) as f64;
        pct
    }
}
