use panduan_core::error::AppError;
use panduan_core::models::{ContentBlock, ExtractedDocument};
use panduan_core::traits::DocumentExtractor;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const DEFAULT_ALT: &str = "tutorial image";

/// Containers whose content is never part of the article.
const SKIPPED: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

/// Whitelisted elements that carry text. A match nested inside another one
/// belongs to its ancestor's block.
const TEXT_TAGS: &[&str] = &["h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "blockquote", "pre", "span"];

/// DOM extractor built on `scraper`.
///
/// Walks the document in order and emits one [`ContentBlock`] per
/// whitelisted element, so block order is reading order. The title is the
/// first `<h1>`; a page without one is rejected.
#[derive(Clone, Default)]
pub struct ScraperExtractor {
    root: Option<Selector>,
}

impl ScraperExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict traversal to the first element matching `selector`
    /// (e.g. `article`, `.post-content`). Falls back to the whole document
    /// when nothing matches.
    pub fn with_root_selector(selector: &str) -> Result<Self, AppError> {
        let root = Selector::parse(selector)
            .map_err(|e| AppError::ConfigError(format!("Invalid root selector '{selector}': {e}")))?;
        Ok(Self { root: Some(root) })
    }

    fn pick_root<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        self.root
            .as_ref()
            .and_then(|s| document.select(s).next())
            .unwrap_or_else(|| document.root_element())
    }
}

impl DocumentExtractor for ScraperExtractor {
    fn extract(&self, html: &str, url: &str) -> Result<ExtractedDocument, AppError> {
        let document = Html::parse_document(html);

        let title = document
            .root_element()
            .descendent_elements()
            .find(|e| e.value().name() == "h1")
            .map(|h1| collapse_whitespace(&h1.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::ExtractionError(format!("No <h1> title found at {url}")))?;

        let base = Url::parse(url).ok();
        let root = self.pick_root(&document);
        let blocks: Vec<ContentBlock> = root
            .descendent_elements()
            .filter(|e| !inside(e, root, SKIPPED))
            .filter_map(|e| to_block(e, root, base.as_ref()))
            .collect();

        tracing::debug!(%url, %title, blocks = blocks.len(), "Extracted document");
        Ok(ExtractedDocument { title, blocks })
    }
}

fn to_block<'a>(element: ElementRef<'a>, root: ElementRef<'a>, base: Option<&Url>) -> Option<ContentBlock> {
    let tag = element.value().name();
    if tag == "img" {
        return image_block(element, base);
    }
    if !TEXT_TAGS.contains(&tag) || inside(&element, root, TEXT_TAGS) {
        return None;
    }

    let block = match tag {
        "ul" | "ol" => {
            let items: Vec<String> = element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|li| li.value().name() == "li")
                .map(|li| collapse_whitespace(&li.text().collect::<String>()))
                .filter(|text| !text.is_empty())
                .collect();
            if items.is_empty() {
                return None;
            }
            return Some(ContentBlock::List {
                ordered: tag == "ol",
                items,
            });
        }
        "pre" => {
            let text = element.text().collect::<String>().trim().to_string();
            ContentBlock::Code { text }
        }
        _ => {
            let text = collapse_whitespace(&element.text().collect::<String>());
            match tag {
                "blockquote" => ContentBlock::Quote { text },
                "p" | "span" => ContentBlock::Paragraph { text },
                heading => ContentBlock::Heading {
                    level: heading[1..].parse().unwrap_or(2),
                    text,
                },
            }
        }
    };

    // Empty text nodes contribute no block.
    if block.texts().iter().all(|t| t.is_empty()) {
        return None;
    }
    Some(block)
}

fn image_block(element: ElementRef<'_>, base: Option<&Url>) -> Option<ContentBlock> {
    let attrs = element.value();
    let raw = [attrs.attr("src"), attrs.attr("data-src")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("data:"))?;

    let src = match base.map(|b| b.join(raw)) {
        Some(Ok(resolved)) => resolved.to_string(),
        _ => raw.to_string(),
    };
    let alt = attrs
        .attr("alt")
        .map(collapse_whitespace)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_ALT.to_string());

    Some(ContentBlock::Image { src, alt })
}

/// True when an ancestor below `root` has one of `tags`.
fn inside(element: &ElementRef<'_>, root: ElementRef<'_>, tags: &[&str]) -> bool {
    element
        .ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(|a| tags.contains(&a.value().name()))
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
