use std::cell::RefCell;

use travelog_core::{Notifier, Severity};
use web_sys::Element;

use crate::dom;

pub const TOAST_CLASS: &str = "error-notification";

/// CSS modifier class for a severity (`error-notification--high`).
#[must_use]
pub fn severity_class(severity: Severity) -> String {
    format!("{TOAST_CLASS}--{}", severity.to_string().to_lowercase())
}

/// One transient toast element appended to `<body>`.
#[derive(Debug, Default)]
pub struct ToastNotifier {
    current: RefCell<Option<Element>>,
}

impl ToastNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build(message: &str, severity: Severity) -> Option<Element> {
        let document = dom::document()?;
        let toast = document.create_element("div").ok()?;
        toast
            .class_list()
            .add_2(TOAST_CLASS, &severity_class(severity))
            .ok()?;
        toast.set_attribute("role", "alert").ok()?;
        toast.set_attribute("aria-live", "assertive").ok()?;
        toast.set_text_content(Some(message));
        document.body()?.append_child(&toast).ok()?;
        Some(toast)
    }
}

impl Notifier for ToastNotifier {
    fn show(&self, message: &str, severity: Severity) {
        self.dismiss();
        match Self::build(message, severity) {
            Some(toast) => *self.current.borrow_mut() = Some(toast),
            None => dom::console_error(message),
        }
    }

    fn dismiss(&self) {
        if let Some(toast) = self.current.borrow_mut().take() {
            toast.remove();
        }
    }
}
