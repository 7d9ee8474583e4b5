//! Page-side download routine: find the first `<video>`, take its first
//! `<source>`, and hand that resource to the browser through a transient
//! `<a download>`.

use thiserror::Error;

use crate::dom::Document;

pub const DEFAULT_FILE_NAME: &str = "video.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("Не удалось найти элемент <video> на странице.")]
    VideoNotFound,
    #[error("Не удалось найти элемент <source> внутри элемента <video>.")]
    SourceNotFound,
}

/// Developer-facing sink for the routine's failure messages.
pub trait Diagnostics {
    fn error(&mut self, message: &str);
}

/// Writes diagnostics to the log.
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn error(&mut self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Returns the first `<source>` of the first `<video>` in `document`.
pub fn locate_source<D: Document>(document: &D) -> Result<D::Node, ScriptError> {
    let video = document
        .first_element("video")
        .ok_or(ScriptError::VideoNotFound)?;

    document
        .first_descendant(&video, "source")
        .ok_or(ScriptError::SourceNotFound)
}

/// Reads the resource locator of a `<source>` element, resolved against the
/// document base the way `HTMLSourceElement.src` is.
pub fn resource_locator<D: Document>(document: &D, source: &D::Node) -> String {
    let raw = document.attribute(source, "src").unwrap_or_default();

    match document.base_url() {
        Some(base) => base
            .join(&raw)
            .map(|url| url.to_string())
            .unwrap_or(raw),
        None => raw,
    }
}

/// Asks the browser to save `locator` as `file_name`.
///
/// The anchor is attached, clicked and detached without yielding, so it is
/// never left in the body once this returns.
pub fn trigger_download<D: Document>(document: &mut D, locator: &str, file_name: &str) {
    let link = document.create_element("a");
    document.set_attribute(&link, "href", locator);
    document.set_attribute(&link, "download", file_name);

    document.append_to_body(&link);
    document.click(&link);
    document.remove_from_body(&link);
}

/// Runs the whole routine and returns the locator handed to the browser.
/// A missing element is reported to `diagnostics` before it is returned.
pub fn run<D, R>(document: &mut D, file_name: &str, diagnostics: &mut R) -> Result<String, ScriptError>
where
    D: Document,
    R: Diagnostics + ?Sized,
{
    let source = locate_source(document).inspect_err(|err| diagnostics.error(&err.to_string()))?;

    let locator = resource_locator(document, &source);
    trigger_download(document, &locator, file_name);

    Ok(locator)
}
