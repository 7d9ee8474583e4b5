use scraper::{ElementRef, Html};
use url::Url;

use super::{Document, DownloadRequest};

/// Handle to an element of an [`HtmlDocument`].
///
/// Parsed elements are addressed by their position in document order;
/// elements created at runtime live in a separate arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlNode {
    Parsed(usize),
    Created(usize),
}

#[derive(Debug)]
struct CreatedElement {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl CreatedElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A parsed page that acts like a browser document for the extraction script.
///
/// Activating an attached anchor that carries a `download` attribute does not
/// fetch anything; it records a [`DownloadRequest`] for the host to fulfil.
pub struct HtmlDocument {
    html: Html,
    base_url: Option<Url>,
    created: Vec<CreatedElement>,
    body: Vec<HtmlNode>,
    downloads: Vec<DownloadRequest>,
}

impl HtmlDocument {
    pub fn parse(source: &str, base_url: Option<Url>) -> Self {
        Self {
            html: Html::parse_document(source),
            base_url,
            created: Vec::new(),
            body: Vec::new(),
            downloads: Vec::new(),
        }
    }

    /// The document a browser shows when it opens a media file directly:
    /// a lone `<video>` whose `<source>` points at `url`.
    pub fn media(url: &Url) -> Self {
        let src = url.as_str().replace('&', "&amp;").replace('"', "&quot;");
        let source = format!(
            r#"<html><body><video controls autoplay name="media"><source src="{src}" type="video/mp4"></video></body></html>"#
        );

        Self::parse(&source, Some(url.clone()))
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Downloads requested by anchor activations so far.
    pub fn downloads(&self) -> &[DownloadRequest] {
        &self.downloads
    }

    pub fn take_downloads(&mut self) -> Vec<DownloadRequest> {
        std::mem::take(&mut self.downloads)
    }

    /// Number of runtime-created nodes currently attached to the body.
    #[cfg(test)]
    pub fn attached_nodes(&self) -> usize {
        self.body.len()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }

    fn parsed(&self, index: usize) -> Option<ElementRef<'_>> {
        self.elements().nth(index)
    }

    fn created(&self, index: usize) -> Option<&CreatedElement> {
        self.created.get(index)
    }
}

impl Document for HtmlDocument {
    type Node = HtmlNode;

    fn first_element(&self, tag: &str) -> Option<HtmlNode> {
        self.elements()
            .position(|element| element.value().name() == tag)
            .map(HtmlNode::Parsed)
    }

    fn first_descendant(&self, parent: &HtmlNode, tag: &str) -> Option<HtmlNode> {
        let HtmlNode::Parsed(index) = *parent else {
            // runtime-created elements never have children
            return None;
        };
        let parent = self.parsed(index)?;

        // pre-order: the element descendants of `parent` directly follow it
        parent
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .position(|element| element.value().name() == tag)
            .map(|offset| HtmlNode::Parsed(index + 1 + offset))
    }

    fn attribute(&self, node: &HtmlNode, name: &str) -> Option<String> {
        match *node {
            HtmlNode::Parsed(index) => self
                .parsed(index)?
                .value()
                .attr(name)
                .map(str::to_string),
            HtmlNode::Created(index) => self.created(index)?.attribute(name).map(str::to_string),
        }
    }

    fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn create_element(&mut self, tag: &str) -> HtmlNode {
        self.created.push(CreatedElement {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        });
        HtmlNode::Created(self.created.len() - 1)
    }

    fn set_attribute(&mut self, node: &HtmlNode, name: &str, value: &str) {
        let HtmlNode::Created(index) = *node else {
            tracing::debug!("ignoring attribute write on parsed element");
            return;
        };
        let Some(element) = self.created.get_mut(index) else {
            return;
        };

        match element.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn append_to_body(&mut self, node: &HtmlNode) {
        if !self.body.contains(node) {
            self.body.push(*node);
        }
    }

    fn remove_from_body(&mut self, node: &HtmlNode) {
        self.body.retain(|attached| attached != node);
    }

    fn click(&mut self, node: &HtmlNode) {
        if !self.body.contains(node) {
            tracing::debug!("click on detached node ignored");
            return;
        }
        let HtmlNode::Created(index) = *node else {
            return;
        };
        let Some(element) = self.created(index) else {
            return;
        };
        if element.tag != "a" {
            return;
        }

        if let (Some(href), Some(file_name)) = (element.attribute("href"), element.attribute("download")) {
            let request = DownloadRequest {
                href: href.to_string(),
                file_name: file_name.to_string(),
            };
            tracing::debug!("download requested: {} -> {}", request.href, request.file_name);
            self.downloads.push(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>t</title></head>
<body>
  <div id="player">
    <video autoplay>
      <source src="https://example.com/first.mp4" type="video/mp4">
      <source src="https://example.com/second.webm" type="video/webm">
    </video>
  </div>
</body></html>"#;

    #[test]
    fn finds_first_video_and_its_first_source() {
        let document = HtmlDocument::parse(PAGE, None);

        let video = document.first_element("video").unwrap();
        let source = document.first_descendant(&video, "source").unwrap();

        assert_eq!(
            document.attribute(&source, "src").as_deref(),
            Some("https://example.com/first.mp4")
        );
        assert_eq!(document.attribute(&video, "autoplay").as_deref(), Some(""));
    }

    #[test]
    fn media_document_wraps_the_url_in_a_source() {
        let url = Url::parse("https://cdn.example/v.mp4?a=1&b=2").unwrap();
        let document = HtmlDocument::media(&url);

        let video = document.first_element("video").unwrap();
        let source = document.first_descendant(&video, "source").unwrap();

        assert_eq!(document.attribute(&source, "src").as_deref(), Some(url.as_str()));
        assert_eq!(document.base_url(), Some(&url));
    }

    #[test]
    fn descendant_lookup_stays_inside_parent() {
        let page = r#"<html><body><video></video><source src="outside.mp4"></body></html>"#;
        let document = HtmlDocument::parse(page, None);

        let video = document.first_element("video").unwrap();

        assert_eq!(document.first_descendant(&video, "source"), None);
    }

    #[test]
    fn click_records_download_only_while_attached() {
        let mut document = HtmlDocument::parse(PAGE, None);
        let anchor = document.create_element("a");
        document.set_attribute(&anchor, "href", "https://example.com/first.mp4");
        document.set_attribute(&anchor, "download", "clip.mp4");

        document.click(&anchor);
        assert!(document.downloads().is_empty());

        document.append_to_body(&anchor);
        document.click(&anchor);
        document.remove_from_body(&anchor);

        assert_eq!(
            document.downloads(),
            &[DownloadRequest {
                href: "https://example.com/first.mp4".to_string(),
                file_name: "clip.mp4".to_string(),
            }]
        );
        assert_eq!(document.attached_nodes(), 0);
    }

    #[test]
    fn anchor_without_download_attribute_is_plain_navigation() {
        let mut document = HtmlDocument::parse(PAGE, None);
        let anchor = document.create_element("A");
        document.set_attribute(&anchor, "href", "https://example.com/first.mp4");

        document.append_to_body(&anchor);
        document.click(&anchor);

        assert!(document.take_downloads().is_empty());
    }
}
