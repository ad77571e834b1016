//! Offer an [`ExportFile`] to the user as a browser download.

use travelog_core::ExportFile;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use crate::dom;

pub const EXPORT_MIME: &str = "application/json";

/// # Errors
///
/// Returns the DOM error if the blob, object URL, or anchor cannot be made.
pub fn download(file: &ExportFile) -> Result<(), JsValue> {
    let document = dom::document().ok_or_else(|| JsValue::from_str("document unavailable"))?;

    let parts = js_sys::Array::of1(&JsValue::from_str(&file.contents));
    let options = BlobPropertyBag::new();
    options.set_type(EXPORT_MIME);
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(&file.file_name);
    anchor.click();

    Url::revoke_object_url(&url)
}
