//! TikTok page classification and the metadata read off a loaded page.

use scraper::{ElementRef, Html};
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

const HOST: &str = "www.tiktok.com";
/// Leaves room for an index prefix and extension under the 255 byte name limit.
const MAX_STEM_BYTES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Video,
    Photo,
    Music,
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PageKind::Video => write!(f, "video"),
            PageKind::Photo => write!(f, "photo"),
            PageKind::Music => write!(f, "music"),
        }
    }
}

/// Classifies a (redirect-resolved) TikTok url.
///
/// Trailing path segments and query strings are ignored, so
/// `/@user/video/123?lang=en` is still a video page.
pub fn classify(url: &Url) -> Result<PageKind> {
    let unsupported = || Error::UnsupportedUrl(url.to_string());

    if url.scheme() != "https" || url.host_str() != Some(HOST) {
        return Err(unsupported());
    }

    let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();

    match segments.as_slice() {
        [user, kind, id, ..] if is_username(user) && starts_with_digit(id) => match *kind {
            "video" => Ok(PageKind::Video),
            "photo" => Ok(PageKind::Photo),
            _ => Err(unsupported()),
        },
        ["music", slug, ..] if is_music_slug(slug) => Ok(PageKind::Music),
        _ => Err(unsupported()),
    }
}

fn is_username(segment: &str) -> bool {
    segment
        .strip_prefix('@')
        .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'))
}

fn starts_with_digit(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// `<slug>-<digits>` where the slug may itself contain dashes and escapes.
fn is_music_slug(segment: &str) -> bool {
    let slug_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '%';

    segment.char_indices().any(|(i, c)| {
        c == '-'
            && i > 0
            && segment[..i].chars().all(slug_char)
            && starts_with_digit(&segment[i + 1..])
    })
}

/// Makes a page description usable as a file name stem.
pub fn clear_file_name(name: &str) -> String {
    let mut stem = String::new();
    for c in name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .map(|c| if c.is_whitespace() { '_' } else { c })
    {
        if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(c);
    }
    stem
}

/// A cleared name that still names a file inside the download directory.
pub fn usable_file_name(name: &str) -> Option<String> {
    let name = clear_file_name(name);
    (!name.chars().all(|c| c == '.')).then_some(name)
}

/// Read-only view over a parsed TikTok page.
pub struct PageInfo<'a> {
    html: &'a Html,
}

impl<'a> PageInfo<'a> {
    pub fn new(html: &'a Html) -> Self {
        Self { html }
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.root_element().descendants().filter_map(ElementRef::wrap)
    }

    fn with_class(&self, tag: Option<&'static str>, fragment: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
        self.elements().filter(move |element| {
            tag.map_or(true, |tag| element.value().name() == tag)
                && element.value().classes().any(|class| class.contains(fragment))
        })
    }

    /// `og:description` meta content, used to name saved files.
    pub fn description(&self) -> Option<String> {
        self.elements()
            .find(|element| {
                element.value().name() == "meta"
                    && element.value().attr("property") == Some("og:description")
            })
            .and_then(|element| element.value().attr("content"))
            .map(str::to_string)
    }

    pub fn author_username(&self) -> Option<String> {
        self.with_class(None, "SpanUniqueId")
            .map(|element| element.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty())
    }

    pub fn music_uri(&self) -> Option<String> {
        self.elements()
            .filter(|element| element.value().name() == "a")
            .filter_map(|element| element.value().attr("href"))
            .find(|href| href.contains("/music/"))
            .map(str::to_string)
    }

    /// Distinct photo slide urls, in page order.
    pub fn photo_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for src in self
            .with_class(Some("img"), "ImgPhotoSlide")
            .filter_map(|element| element.value().attr("src"))
        {
            if !urls.iter().any(|seen| seen == src) {
                urls.push(src.to_string());
            }
        }
        urls
    }

    pub fn audio_url(&self) -> Option<String> {
        self.first_src("audio")
    }

    /// `src` of the first `<video>`, the media url of video and music pages.
    pub fn video_src(&self) -> Option<String> {
        self.first_src("video")
    }

    fn first_src(&self, tag: &str) -> Option<String> {
        self.elements()
            .find(|element| element.value().name() == tag)
            .and_then(|element| element.value().attr("src"))
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    }

    /// Name and profile link of a music page's author.
    pub fn music_author(&self) -> Option<(String, String)> {
        self.with_class(Some("a"), "StyledLink").find_map(|element| {
            let href = element.value().attr("href").filter(|href| href.contains("/@"))?;
            let name = element.text().collect::<String>().trim().to_string();
            (!name.is_empty()).then(|| (name, href.to_string()))
        })
    }

    /// Leading number of the "<n> videos" counter on a music page.
    pub fn clip_count(&self) -> Option<u64> {
        self.elements()
            .filter(|element| {
                element.value().name() == "strong"
                    && element
                        .value()
                        .attr("style")
                        .is_some_and(|style| style.contains("font-weight: normal"))
            })
            .find_map(|element| element.text().collect::<String>().split_whitespace().next()?.parse().ok())
    }

    pub fn clip_urls(&self) -> Vec<String> {
        self.with_class(Some("a"), "AMetaCaptionLine")
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }

    /// Cover image from the music card's `background-image: url(...)` style.
    pub fn music_thumb_url(&self) -> Option<String> {
        let style = self
            .with_class(None, "DivMusicCardContainer")
            .find_map(|element| element.value().attr("style"))?;
        let start = style.find("url(")? + "url(".len();
        let end = start + style[start..].find(')')?;
        let url = style[start..end].trim().trim_matches(|c| c == '"' || c == '\'');

        match url {
            "" => None,
            url if url.starts_with("//") => Some(format!("https:{url}")),
            url => Some(url.to_string()),
        }
    }
}
