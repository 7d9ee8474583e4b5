//! Document handle the extraction script runs against.
//!
//! The script never touches a global document: whoever runs it passes a
//! [`Document`] in. [`html::HtmlDocument`] is the implementation backed by a
//! parsed page; tests use small in-memory fakes.

pub mod html;

use url::Url;

pub use html::HtmlDocument;

/// What activating an anchor with a `download` attribute asks the host to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub href: String,
    pub file_name: String,
}

pub trait Document {
    type Node: Clone;

    /// First element with the given tag name, in document order.
    fn first_element(&self, tag: &str) -> Option<Self::Node>;

    /// First element with the given tag name below `parent`.
    fn first_descendant(&self, parent: &Self::Node, tag: &str) -> Option<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Base URL relative attribute values resolve against, if known.
    fn base_url(&self) -> Option<&Url> {
        None
    }

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn append_to_body(&mut self, node: &Self::Node);

    fn remove_from_body(&mut self, node: &Self::Node);

    /// Dispatches a synthetic activation on `node`.
    fn click(&mut self, node: &Self::Node);
}
